pub mod csma;
pub mod cyclic;
pub mod link;
pub mod terminal;
