use fxhash::FxHashMap;

use super::parameter::Parameter;

/// Where a parameter ended up after sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renumbered {
    pub number: usize,
    pub is_global: bool,
}

/// Mapping from the parameter numbers of the template to the numbers after sorting.
///
/// Also remembers each parameter's classification, which the reference rewriting looks up by
/// the old number.
#[derive(Debug, Clone, Default)]
pub struct Remap {
    map: FxHashMap<usize, Renumbered>,
}

impl Remap {
    pub fn get(&self, old_number: usize) -> Option<Renumbered> {
        self.map.get(&old_number).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        self.map.iter().all(|(old, new)| *old == new.number)
    }
}

/// True if every global parameter already precedes every run specific one
pub fn is_grouped(params: &[Parameter]) -> bool {
    let n_global = params.iter().filter(|p| p.is_global).count();
    params[..n_global].iter().all(|p| p.is_global)
}

/// Stable partition of classified parameters: global first, then run specific.
///
/// The relative order inside each group is preserved and the parameters are renumbered
/// 1..=len afterwards. Returns the old -> new mapping; on an already grouped list no
/// reordering happens and the mapping is the identity.
pub fn sort_parameters(params: &mut Vec<Parameter>) -> Remap {
    if !is_grouped(params) {
        log::info!("Sorting parameters: global parameters first, run specific ones after");
        let (global, specific): (Vec<Parameter>, Vec<Parameter>) =
            params.drain(..).partition(|p| p.is_global);
        params.extend(global);
        params.extend(specific);
    }

    let mut remap = Remap::default();
    for (idx, param) in params.iter_mut().enumerate() {
        remap.map.insert(
            param.number,
            Renumbered {
                number: idx + 1,
                is_global: param.is_global,
            },
        );
        param.number = idx + 1;
    }
    remap
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classified(globals: &[bool]) -> Vec<Parameter> {
        globals
            .iter()
            .enumerate()
            .map(|(i, g)| {
                let mut p = Parameter::new(i + 1, &format!("p{}", i + 1), i as f64, 0.1);
                p.is_global = *g;
                p
            })
            .collect()
    }

    #[test]
    fn test_sort_moves_globals_first() {
        let mut params = classified(&[false, true, false, true]);
        let remap = sort_parameters(&mut params);
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p2", "p4", "p1", "p3"]);
        assert_eq!(params.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(remap.get(1).unwrap().number, 3);
        assert_eq!(remap.get(2).unwrap().number, 1);
        assert!(!remap.get(3).unwrap().is_global);
        assert!(remap.get(4).unwrap().is_global);
        assert_eq!(remap.get(5), None);
        assert!(!remap.is_identity());
    }

    proptest! {
        #[test]
        fn sorting_is_idempotent(globals in prop::collection::vec(any::<bool>(), 0..24)) {
            let mut params = classified(&globals);
            sort_parameters(&mut params);
            let once = params.clone();
            let remap = sort_parameters(&mut params);
            prop_assert!(remap.is_identity());
            prop_assert_eq!(remap.len(), once.len());
            prop_assert_eq!(params, once);
        }

        #[test]
        fn sorting_groups_and_keeps_relative_order(globals in prop::collection::vec(any::<bool>(), 0..24)) {
            let mut params = classified(&globals);
            sort_parameters(&mut params);
            prop_assert!(is_grouped(&params));
            let n_global = globals.iter().filter(|g| **g).count();
            let values: Vec<f64> = params.iter().map(|p| p.value).collect();
            prop_assert!(values[..n_global].windows(2).all(|w| w[0] < w[1]));
            prop_assert!(values[n_global..].windows(2).all(|w| w[0] < w[1]));
        }
    }
}
