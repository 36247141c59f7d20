pub mod organization;
pub mod public;
pub mod whoami;
