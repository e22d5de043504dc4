pub mod candidate;
pub mod company;
pub mod feedback;
