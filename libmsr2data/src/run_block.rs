use std::fmt::Display;
use std::str::FromStr;

use super::run_number::replace_last;

/// Scalar parameter roles a RUN block can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Norm,
    BkgFit,
    Alpha,
    Beta,
    Lifetime,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Norm,
        Role::BkgFit,
        Role::Alpha,
        Role::Beta,
        Role::Lifetime,
    ];

    /// The msr keyword of the role
    pub fn keyword(&self) -> &'static str {
        match self {
            Role::Norm => "norm",
            Role::BkgFit => "backgr.fit",
            Role::Alpha => "alpha",
            Role::Beta => "beta",
            Role::Lifetime => "lifetime",
        }
    }

    fn index(&self) -> usize {
        match self {
            Role::Norm => 0,
            Role::BkgFit => 1,
            Role::Alpha => 2,
            Role::Beta => 3,
            Role::Lifetime => 4,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

impl FromStr for Role {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .find(|r| r.keyword() == s)
            .copied()
            .ok_or(())
    }
}

/// What a role points at: a fit parameter or a FUNCTIONS entry (`funN`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRef {
    Param(usize),
    Function(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleEntry {
    pub reference: RoleRef,
    pub is_global: bool,
}

/// One slot of the map vector. A target of 0 marks an empty slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapSlot {
    pub target: usize,
    pub is_global: bool,
}

impl MapSlot {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            is_global: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target == 0
    }
}

/// A RUN block of an msr file.
///
/// Only the run name, the role references and the map take part in the global file synthesis;
/// every other line of the block is carried along untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunBlock {
    pub run_name: String,
    /// Everything on the RUN line after the run name (beamline, institute, format)
    pub header_tail: String,
    roles: [Option<RoleEntry>; 5],
    pub map: Vec<MapSlot>,
    pub other_lines: Vec<String>,
}

impl RunBlock {
    pub fn new(run_name: &str) -> Self {
        Self {
            run_name: run_name.to_string(),
            ..Default::default()
        }
    }

    pub fn role(&self, role: Role) -> Option<RoleEntry> {
        self.roles[role.index()]
    }

    pub fn set_role(&mut self, role: Role, reference: RoleRef) {
        self.roles[role.index()] = Some(RoleEntry {
            reference,
            is_global: true,
        });
    }

    pub fn role_mut(&mut self, role: Role) -> Option<&mut RoleEntry> {
        self.roles[role.index()].as_mut()
    }

    /// Parameter number held by a map slot (1-based), 0 if empty or out of range
    pub fn map_target(&self, slot: usize) -> usize {
        slot.checked_sub(1)
            .and_then(|idx| self.map.get(idx))
            .map(|s| s.target)
            .unwrap_or(0)
    }

    /// Substitute the last occurrence of old in the run name by new.
    ///
    /// Returns false if the run name does not contain old.
    pub fn replace_run_number(&mut self, old: &str, new: &str) -> bool {
        match replace_last(&self.run_name, old, new) {
            Some(name) => {
                self.run_name = name;
                true
            }
            None => false,
        }
    }

    /// Add `by` to every run specific role reference and map target
    pub fn shift_specific_up(&mut self, by: usize) {
        self.shift_specific(|n| n + by);
    }

    /// Subtract `by` from every run specific role reference and map target
    pub fn shift_specific_down(&mut self, by: usize) {
        self.shift_specific(|n| n.saturating_sub(by));
    }

    fn shift_specific(&mut self, shift: impl Fn(usize) -> usize) {
        for entry in self.roles.iter_mut().flatten() {
            if let RoleRef::Param(number) = entry.reference {
                if !entry.is_global {
                    entry.reference = RoleRef::Param(shift(number));
                }
            }
        }
        for slot in self.map.iter_mut() {
            if !slot.is_empty() && !slot.is_global {
                slot.target = shift(slot.target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_keywords_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.keyword()), Ok(role));
        }
        assert!(Role::from_str("lifetimecorrection").is_err());
    }

    #[test]
    fn test_shift_only_touches_specific_entries() {
        let mut block = RunBlock::new("data/run0100");
        block.set_role(Role::Alpha, RoleRef::Param(2));
        block.set_role(Role::Norm, RoleRef::Function(1));
        block.set_role(Role::Beta, RoleRef::Param(1));
        block.role_mut(Role::Alpha).unwrap().is_global = false;
        block.role_mut(Role::Norm).unwrap().is_global = false;
        block.map = vec![
            MapSlot {
                target: 3,
                is_global: false,
            },
            MapSlot::new(1),
            MapSlot::default(),
        ];

        block.shift_specific_up(2);
        assert_eq!(block.role(Role::Alpha).unwrap().reference, RoleRef::Param(4));
        assert_eq!(block.role(Role::Norm).unwrap().reference, RoleRef::Function(1));
        assert_eq!(block.role(Role::Beta).unwrap().reference, RoleRef::Param(1));
        assert_eq!(block.map_target(1), 5);
        assert_eq!(block.map_target(2), 1);
        assert_eq!(block.map_target(3), 0);
        assert_eq!(block.map_target(9), 0);

        block.shift_specific_down(2);
        assert_eq!(block.role(Role::Alpha).unwrap().reference, RoleRef::Param(2));
        assert_eq!(block.map_target(1), 3);
    }

    #[test]
    fn test_replace_run_number() {
        let mut block = RunBlock::new("d2010/run0100_his0100");
        assert!(block.replace_run_number("0100", "0101"));
        assert_eq!(block.run_name, "d2010/run0100_his0101");
        assert!(!block.replace_run_number("0999", "1000"));
    }
}
