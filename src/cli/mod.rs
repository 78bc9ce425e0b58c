pub mod estimate;
pub mod history;
pub mod positions;
pub mod setup;
pub mod ui;
