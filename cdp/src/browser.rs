//! `Browser` domain.

use serde::Serialize;

use crate::{Empty, Method};

/// `Browser.close`
#[derive(Clone, Debug, Default, Serialize)]
pub struct Close {}

impl Method for Close {
    const NAME: &'static str = "Browser.close";
    type Returns = Empty;
}
