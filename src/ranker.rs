use std::cmp::Ordering;

/// Anything the ranker can order by score.
pub trait Scored {
    fn score(&self) -> f64;
}

/// Sorts by score descending and keeps the best `top_n`.
///
/// The sort is stable, so exact ties keep their discovery order.
pub fn rank<T: Scored>(mut items: Vec<T>, top_n: usize) -> Vec<T> {
    items.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
    items.truncate(top_n);
    items
}
