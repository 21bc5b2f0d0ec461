//! gRPC glue for `tonic` clients.

use crate::context::{CallContext, ConnectionContext, ROUTING_HEADER};
use tonic::metadata::AsciiMetadataValue;
use tonic::{Request, Status};

impl ConnectionContext {
    /// Attaches the routing header to an outgoing request.
    pub fn stamp<T>(&self, request: &mut Request<T>) -> Result<(), Status> {
        let value: AsciiMetadataValue = self
            .instance_id()
            .parse()
            .map_err(|_| Status::invalid_argument("instance id is not valid metadata"))?;
        request.metadata_mut().insert(ROUTING_HEADER, value);
        Ok(())
    }
}

impl CallContext {
    /// Wraps `message` in a request stamped with the routing header and,
    /// when the attempt has a deadline, the matching `grpc-timeout`.
    ///
    /// ```
    /// # fn check(ctx: &mt5_reconnect::CallContext) -> Result<(), tonic::Status> {
    /// let request = ctx.request("EURUSD".to_string())?;
    /// assert_eq!(
    ///     request.metadata().get("id").and_then(|v| v.to_str().ok()),
    ///     Some(ctx.instance_id())
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn request<T>(&self, message: T) -> Result<Request<T>, Status> {
        let mut request = Request::new(message);
        self.connection().stamp(&mut request)?;
        if let Some(remaining) = self.remaining() {
            request.set_timeout(remaining);
        }
        Ok(request)
    }
}
