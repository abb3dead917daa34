mod lesson;
mod progress;
mod state;

pub use lesson::LessonView;
pub use progress::ProgressView;
pub use state::{ViewError, ViewState, view_state_from_resource};

#[cfg(test)]
mod test_harness;
#[cfg(test)]
mod view_smoke;
