mod components;
mod scripts;
mod view;

pub use view::LessonView;

#[cfg(test)]
pub(crate) use view::LessonTestHandles;
