pub mod visitor_count;
pub mod visitor_info;

pub use visitor_count::Entity as VisitorCountEntity;
pub use visitor_info::Entity as VisitorInfoEntity;
