pub mod handler;
pub mod notification;
pub mod poller;
pub mod resizer;
pub mod storage;
pub mod uploader;
