//! Preview sampling for folder overviews.
//!
//! Picks `amount` loadable items spread evenly over a folder listing. Items
//! that fail to load shift the probe forward and the stride is recomputed for
//! what is left. When the listing is too sparse for that (stride drops to zero
//! or the probe runs off the end) the result falls back to the first `amount`
//! loadable items in order.

use log::debug;

#[derive(Debug, Clone)]
pub struct Preview<T> {
    /// Position in the sampled listing
    pub index: usize,
    pub id: String,
    pub media: T,
}

/// Sample up to `amount` previews from `items`.
///
/// `load` returns `None` for anything that can't be previewed (folders,
/// undecodable files). Results are ordered by position.
pub fn gather_previews<T, F>(items: &[String], amount: usize, mut load: F) -> Vec<Preview<T>>
where
    F: FnMut(usize, &str) -> Option<T>,
{
    let total = items.len();
    if amount == 0 || total == 0 {
        return Vec::new();
    }

    let mut targets = Vec::with_capacity(amount);
    let mut try_add = |index: usize, targets: &mut Vec<Preview<T>>| -> bool {
        match load(index, &items[index]) {
            Some(media) => {
                targets.push(Preview { index, id: items[index].clone(), media });
                true
            }
            None => false,
        }
    };

    if total < amount {
        first_loadable(total, amount, &mut targets, &mut try_add);
        return targets;
    }

    let mut found = 0;
    let mut step = total / amount;
    let mut index = 0;
    'sampling: loop {
        while !try_add(index, &mut targets) {
            index += 1;
            step = total.saturating_sub(index) / (amount - found);
            if index >= total || step == 0 {
                debug!("Sparse listing ({} items), previewing first loadable instead", total);
                targets.clear();
                first_loadable(total, amount, &mut targets, &mut try_add);
                break 'sampling;
            }
        }

        found += 1;
        if found >= amount {
            break;
        }
        index += step;
        if index >= total {
            break;
        }
    }

    targets.sort_by_key(|p| p.index);
    targets
}

fn first_loadable<T>(
    total: usize,
    amount: usize,
    targets: &mut Vec<Preview<T>>,
    try_add: &mut impl FnMut(usize, &mut Vec<Preview<T>>) -> bool,
) {
    for index in 0..total {
        if targets.len() >= amount {
            break;
        }
        try_add(index, targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    fn indices(previews: &[Preview<usize>]) -> Vec<usize> {
        previews.iter().map(|p| p.index).collect()
    }

    #[test]
    fn test_even_spread() {
        let previews = gather_previews(&items(10), 4, |i, _| Some(i));
        assert_eq!(indices(&previews), vec![0, 2, 4, 6]);
        assert_eq!(previews[1].id, "f2");
    }

    #[test]
    fn test_small_folder_takes_everything() {
        let previews = gather_previews(&items(3), 4, |i, _| Some(i));
        assert_eq!(indices(&previews), vec![0, 1, 2]);
    }

    #[test]
    fn test_failures_shift_and_restep() {
        let previews = gather_previews(&items(10), 4, |i, _| (i != 2).then_some(i));
        assert_eq!(indices(&previews), vec![0, 3, 5, 7]);
    }

    #[test]
    fn test_sparse_listing_falls_back() {
        let previews = gather_previews(&items(8), 4, |i, _| (i == 7).then_some(i));
        assert_eq!(indices(&previews), vec![7]);
    }

    #[test]
    fn test_nothing_loadable() {
        let previews = gather_previews(&items(6), 2, |_, _| None::<usize>);
        assert!(previews.is_empty());
        assert!(gather_previews(&items(6), 0, |i, _| Some(i)).is_empty());
    }
}
