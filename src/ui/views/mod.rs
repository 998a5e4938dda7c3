mod admins;
mod dashboard;
mod landing;
mod project_detail;

pub use admins::AdminListView;
pub use dashboard::DashboardView;
pub use landing::LandingView;
pub use project_detail::ProjectDetailView;
