//! Field-name convention codec for the dashboard wire protocol
//!
//! Application code names fields in camelCase (`firstName`), the server speaks
//! snake_case (`first_name`). Every body, query map, and multipart form that
//! crosses the transport boundary is rewritten by this crate:
//!
//! 1. `to_wire()` on the way out (request body, query parameters, form field names)
//! 2. `to_application()` on the way in (response and error bodies)
//!
//! Only mapping keys are rewritten. Scalars pass through, sequences are walked
//! element by element, and `Value::Opaque` payloads (bytes, timestamps, files)
//! are never inspected.

pub mod codec;
pub mod value;

pub use codec::{CaseConvention, convert, form_to_wire, to_application, to_wire};
pub use value::{FileData, Form, FormPart, Opaque, Value};
