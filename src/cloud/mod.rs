mod azure;

pub use azure::AzureBlobUploader;
