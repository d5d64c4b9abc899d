pub mod archive_transfer;
