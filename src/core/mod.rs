/// Reader and handler abstractions shared by every item source.
pub mod item;
