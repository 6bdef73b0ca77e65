pub mod bitrix;
pub mod init;
