use std::convert::Infallible;

use clap::Args;

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Version;

impl Op for Version {
    type Error = Infallible;
    type Output = String;

    fn execute(&self, _ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        Ok(format!(
            "{} ({}, built {})",
            env!("REPO_VERSION"),
            env!("BUILD_PROFILE"),
            env!("BUILD_TIMESTAMP")
        ))
    }
}
