pub mod catalog;
pub mod habit;
pub mod library;
pub mod progress;

pub use catalog::{BookDetails, CatalogService, Upload};
pub use habit::{HabitService, StreakChange};
pub use library::LibraryService;
pub use progress::ProgressService;
