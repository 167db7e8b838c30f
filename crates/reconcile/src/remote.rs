//! Status interpretation shared by the controllers.

use crate::coordinator::{Snapshot, VersionToken};
use crate::error::{Error, Result};
use crate::kind::ResourceKind;
use nsxkit::{Request, Response, Transport};
use serde::de::DeserializeOwned;

/// Who a remote call is made on behalf of, for error messages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Subject<'a> {
    pub kind: ResourceKind,
    pub name: &'a str,
}

impl<'a> Subject<'a> {
    pub(crate) const fn new(kind: ResourceKind, name: &'a str) -> Self {
        Self { kind, name }
    }

    /// Send a request and require a success status.
    ///
    /// 409 and 412 become [`Error::Conflict`].
    pub(crate) fn send(&self, transport: &dyn Transport, request: &Request) -> Result<Response> {
        let response = self.exchange(transport, request)?;
        self.check(response)
    }

    /// Like [`send`](Self::send) but a 404 is `Ok(None)`.
    pub(crate) fn fetch(
        &self,
        transport: &dyn Transport,
        request: &Request,
    ) -> Result<Option<Response>> {
        let response = self.exchange(transport, request)?;
        if response.is_not_found() {
            return Ok(None);
        }
        self.check(response).map(Some)
    }

    /// Fetch a document versioned by an `ETag` header.
    pub(crate) fn fetch_versioned<D: DeserializeOwned>(
        &self,
        transport: &dyn Transport,
        request: &Request,
    ) -> Result<Option<Snapshot<D>>> {
        let Some(response) = self.fetch(transport, request)? else {
            return Ok(None);
        };
        let etag = response.etag().map(str::to_string).ok_or_else(|| {
            Error::status(self.kind, self.name, response.status(), "response carried no ETag")
        })?;
        let document = self.decode(&response)?;
        Ok(Some(Snapshot::new(document, VersionToken::ETag(etag))))
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self, response: &Response) -> Result<T> {
        response
            .json()
            .map_err(|e| Error::transport(self.kind, self.name, e))
    }

    pub(crate) fn validation(&self, message: impl std::fmt::Display) -> Error {
        Error::validation(self.kind, self.name, message)
    }

    fn exchange(&self, transport: &dyn Transport, request: &Request) -> Result<Response> {
        log::debug!("{} {} ({} '{}')", request.method(), request.path(), self.kind.label(), self.name);
        let response = transport
            .send(request)
            .map_err(|e| Error::transport(self.kind, self.name, e))?;
        log::debug!("{} {} -> {}", request.method(), request.path(), response.status());
        Ok(response)
    }

    fn check(&self, response: Response) -> Result<Response> {
        match response.status() {
            _ if response.is_success() => Ok(response),
            409 | 412 => Err(Error::Conflict {
                kind: self.kind,
                name: self.name.to_string(),
                status: response.status(),
                body: response.raw().to_string(),
            }),
            status => Err(Error::status(self.kind, self.name, status, response.raw())),
        }
    }
}
