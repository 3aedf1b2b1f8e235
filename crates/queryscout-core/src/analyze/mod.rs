//! Plan analysis: risk scoring and index recommendation mining

mod recommend;
mod scorer;

pub use recommend::{merge, mine_plan, RecommendedIndex};
pub use scorer::score_plan;
