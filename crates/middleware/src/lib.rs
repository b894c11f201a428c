//! Serves `.pdf` URLs from any HTML-producing [`Handler`].
//!
//! A request for `/reports/q3.pdf` reaches the wrapped handler as
//! `/reports/q3` with `text/html` preferred in `Accept`. If the handler
//! answers with HTML, its body is converted and the response becomes
//! `application/pdf`. Everything else passes through untouched.
//!
//! ```no_run
//! use http::{Request, Response};
//! use pagekit_middleware::{Conditions, Handler, Middleware};
//! use pagekit_render::{Converter, Settings};
//!
//! let app = |_request: Request<Vec<u8>>| {
//!     Response::builder()
//!         .header("content-type", "text/html")
//!         .body(b"<h1>Q3</h1>".to_vec())
//! };
//! let converter = Converter::new(Settings::default())?;
//! let middleware = Middleware::new(app, converter).with_conditions(Conditions::new().only(["/reports"]));
//! let response = middleware.call(Request::get("/reports/q3.pdf").body(Vec::new())?)?;
//! assert_eq!(response.headers()["content-type"], "application/pdf");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod conditions;
pub mod error;
mod middleware;
mod request;

pub use crate::conditions::{Conditions, DEFAULT_DISPOSITION, Rule};
pub use crate::error::Error;
pub use crate::middleware::{Handler, JAVASCRIPT_DELAY_HEADER, Middleware, OPTIONS_HEADER, Overrides, SAVE_PDF_HEADER};
pub use crate::request::RenderingPdf;
