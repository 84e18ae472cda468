//! Transfer client bound to one remote resource.
//!
//! `TransferClient` turns typed options into requests, sends them through a
//! shared `Pipeline`, and drives large transfers through the chunk scheduler.

mod download;
mod options;
mod sink;
mod upload;

pub use options::{
    DownloadOptions, DownloadProperties, DownloadResponse, DownloadToOptions, DownloadToResult, UploadFromOptions,
    UploadFromResult, CHUNK_GRAIN, DEFAULT_CONCURRENCY, DEFAULT_INITIAL_CHUNK_SIZE, DEFAULT_UPLOAD_CHUNK_SIZE,
    MAX_DOWNLOAD_CHUNK_SIZE, MIB,
};

use crate::message::Request;
use crate::pipeline::Pipeline;
use http::Method;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone)]
pub struct TransferClient {
    pipeline: Arc<Pipeline>,
    url: Url,
}

impl TransferClient {
    pub fn new(pipeline: Arc<Pipeline>, url: Url) -> Self {
        Self { pipeline, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn request(&self, method: Method) -> Request {
        Request::new(method, self.url.clone())
    }
}
