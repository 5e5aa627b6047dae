pub mod host2dispatch;
pub mod link2dispatch;
