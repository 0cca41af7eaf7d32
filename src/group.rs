//! Device grouping for batch commands.

use serde::Serialize;
use uuid::Uuid;

use crate::address::DeviceAddress;
use crate::device::Device;
use crate::types::{Color, Power};

/// A user-defined collection of devices driven as one.
///
/// Groups hold addresses rather than device handles, so membership
/// survives a device being forgotten and rediscovered. The stored power
/// and color are the last values commanded through the group; like
/// device fields they are optimistic, never confirmed.
///
/// These groupings live in this client only; they are unrelated to the
/// group membership a device stores on its own flash (see
/// [`Device::device_group`]).
#[derive(Debug, Serialize, Clone)]
pub struct Group {
    id: Uuid,
    name: String,
    members: Vec<DeviceAddress>,
    power: Power,
    color: Color,
}

impl Group {
    /// Create a new group with the given name.
    pub fn new(name: &str) -> Self {
        Group {
            id: Uuid::new_v4(),
            name: String::from(name),
            members: Vec::new(),
            power: Power::On,
            // Full-brightness neutral white.
            color: Color::new(0, 0, u16::MAX, 5750),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = String::from(name);
    }

    /// The last power state commanded through this group.
    pub fn power(&self) -> Power {
        self.power
    }

    /// The last color commanded through this group.
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn members(&self) -> &[DeviceAddress] {
        &self.members
    }

    pub fn contains(&self, address: DeviceAddress) -> bool {
        self.members.contains(&address)
    }

    /// Add a member; addresses are kept unique.
    pub(crate) fn add(&mut self, address: DeviceAddress) -> bool {
        if self.contains(address) {
            return false;
        }
        self.members.push(address);
        true
    }

    pub(crate) fn remove(&mut self, address: DeviceAddress) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != address);
        self.members.len() != before
    }

    /// Fan a power command out to every resolved member.
    pub(crate) fn apply_power(&mut self, devices: &[Device], power: Power, duration_ms: u32) {
        self.power = power;
        for device in devices {
            device.set_power(power, duration_ms);
        }
    }

    /// Fan a color command out to every resolved member.
    ///
    /// Members without color capability are skipped.
    pub(crate) fn apply_color(&mut self, devices: &[Device], color: Color, duration_ms: u32) {
        self.color = color;
        for device in devices {
            if let Some(light) = device.as_light() {
                light.set_color(color, duration_ms);
            }
        }
    }
}

/// Default names for new groups: "Group 1", "Group 2", ...
#[derive(Debug, Default)]
pub(crate) struct NameSequence {
    count: u32,
}

impl NameSequence {
    pub fn next(&mut self) -> String {
        self.count += 1;
        format!("Group {}", self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DEFAULT_DURATION_MS;
    use crate::events::EventBus;
    use crate::message::MessageKind;
    use crate::transport::testing::RecordingSink;
    use crate::transport::FrameSink;
    use std::sync::Arc;

    #[test]
    fn test_membership_is_unique() {
        let mut group = Group::new("Upstairs");
        let address = DeviceAddress::new(1);
        assert!(group.add(address));
        assert!(!group.add(address));
        assert_eq!(group.members().len(), 1);
        assert!(group.remove(address));
        assert!(!group.remove(address));
    }

    #[test]
    fn test_apply_power_reaches_every_member() {
        let sink = Arc::new(RecordingSink::default());
        let devices: Vec<Device> = (1..=2)
            .map(|value| {
                Device::new_light(
                    DeviceAddress::new(value),
                    Arc::clone(&sink) as Arc<dyn FrameSink>,
                    EventBus::new(),
                )
            })
            .collect();

        let mut group = Group::new("Upstairs");
        group.apply_power(&devices, Power::Off, DEFAULT_DURATION_MS);

        assert_eq!(group.power(), Power::Off);
        assert_eq!(
            sink.kinds(),
            vec![MessageKind::SetLightPower, MessageKind::SetLightPower]
        );
        for device in &devices {
            assert_eq!(device.power(), Some(Power::Off));
        }
    }

    #[test]
    fn test_apply_color_skips_non_lights() {
        let sink = Arc::new(RecordingSink::default());
        let light = Device::new_light(
            DeviceAddress::new(1),
            Arc::clone(&sink) as Arc<dyn FrameSink>,
            EventBus::new(),
        );
        let plain = Device::new(
            DeviceAddress::new(2),
            Arc::clone(&sink) as Arc<dyn FrameSink>,
            EventBus::new(),
        );

        let mut group = Group::new("Mixed");
        let color = Color::new(100, 200, 300, 3500);
        group.apply_color(&[light.clone(), plain], color, 0);

        assert_eq!(sink.kinds(), vec![MessageKind::SetColor]);
        assert_eq!(light.as_light().unwrap().color(), Some(color));
    }

    #[test]
    fn test_name_sequence_numbers_from_one() {
        let mut names = NameSequence::default();
        assert_eq!(names.next(), "Group 1");
        assert_eq!(names.next(), "Group 2");
    }
}
