use log::debug;
use rustc_hash::FxHashMap;

bitflags::bitflags! {
    /// Active gameplay modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModSet: u8 {
        /// Raises AR/OD/CS before derivation and mirrors the playfield vertically.
        const HARD_ROCK = 1 << 0;
        /// Circles fade out while approaching. Visual only.
        const HIDDEN = 1 << 1;
    }
}

impl ModSet {
    /// Looks up a single modifier by its settings key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "hardrock" | "hr" => Some(Self::HARD_ROCK),
            "hidden" | "hd" => Some(Self::HIDDEN),
            _ => None,
        }
    }

    /// Builds a set from a name -> enabled mapping. Unknown names are ignored.
    pub fn from_toggles<'a, I>(toggles: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut set = Self::empty();
        for (name, enabled) in toggles {
            match Self::from_key(name) {
                Some(flag) if enabled => set |= flag,
                Some(_) => {}
                None => debug!("Ignoring unknown modifier '{name}'"),
            }
        }
        set
    }

    pub fn from_map(toggles: &FxHashMap<String, bool>) -> Self {
        Self::from_toggles(toggles.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

impl core::fmt::Display for ModSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }
        let mut parts: Vec<&str> = Vec::with_capacity(2);
        if self.contains(Self::HARD_ROCK) {
            parts.push("HardRock");
        }
        if self.contains(Self::HIDDEN) {
            parts.push("Hidden");
        }
        write!(f, "{}", parts.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_disabled_keys_are_ignored() {
        let mut toggles = FxHashMap::default();
        toggles.insert("hardrock".to_string(), true);
        toggles.insert("hidden".to_string(), false);
        toggles.insert("doubletime".to_string(), true);
        let set = ModSet::from_map(&toggles);
        assert_eq!(set, ModSet::HARD_ROCK);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let set = ModSet::from_toggles([("HardRock", true), ("HIDDEN", true)]);
        assert!(set.contains(ModSet::HARD_ROCK | ModSet::HIDDEN));
        assert_eq!(set.to_string(), "HardRock+Hidden");
    }
}
