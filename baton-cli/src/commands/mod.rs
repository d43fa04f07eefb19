pub mod bot;
pub mod init;
pub mod say;
pub mod show;
