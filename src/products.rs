//! Hardware product catalog.

use std::fmt;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Known hardware products (vendor 1).
///
/// Devices report their model as a raw `u32` in the version reply;
/// unknown codes stay raw on the device and simply have no display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Product {
    Original1000 = 1,
    Color650 = 3,
    White800Lv = 10,
    White800Hv = 11,
    White900Br30 = 18,
    Color1000Br30 = 20,
    Color1000 = 22,
    A19 = 27,
    Br30 = 28,
    PlusA19 = 29,
    PlusBr30 = 30,
    Z = 31,
    Z2 = 32,
    Downlight = 36,
    DownlightGen2 = 37,
    A19Gen2 = 43,
    Br30Gen2 = 44,
    PlusA19Gen2 = 45,
    PlusBr30Gen2 = 46,
    Mini = 49,
    MiniWhite = 50,
    MiniDayAndDusk = 51,
    Gu10 = 52,
}

impl Product {
    /// Look up a product by its reported code.
    ///
    /// # Examples
    ///
    /// ```
    /// use lifx_lan_rs::Product;
    ///
    /// assert_eq!(Product::create(49), Some(Product::Mini));
    /// assert_eq!(Product::create(9999), None);
    /// ```
    pub fn create(code: u32) -> Option<Self> {
        Product::iter().find(|product| *product as u32 == code)
    }

    /// The product's reported code.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Marketing name for this product.
    pub fn name(&self) -> &'static str {
        match self {
            Product::Original1000 => "Original 1000",
            Product::Color650 => "Color 650",
            Product::White800Lv => "White 800 LV",
            Product::White800Hv => "White 800 HV",
            Product::White900Br30 => "White 900 BR30",
            Product::Color1000Br30 => "Color 1000 BR30",
            Product::Color1000 => "Color 1000",
            Product::A19 | Product::A19Gen2 => "LIFX A19",
            Product::Br30 | Product::Br30Gen2 => "LIFX BR30",
            Product::PlusA19 | Product::PlusA19Gen2 => "LIFX+ A19",
            Product::PlusBr30 | Product::PlusBr30Gen2 => "LIFX+ BR30",
            Product::Z => "LIFX Z",
            Product::Z2 => "LIFX Z 2",
            Product::Downlight | Product::DownlightGen2 => "LIFX Downlight",
            Product::Mini => "LIFX Mini",
            Product::MiniWhite => "LIFX Mini White",
            Product::MiniDayAndDusk => "LIFX Mini Day and Dusk",
            Product::Gu10 => "LIFX GU10",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
