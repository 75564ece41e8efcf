// Copyright 2026 Route Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Route Harvest: collect API, RSC, route, and anchor links from web pages.
//!
//! Every mode runs the same pipeline: acquire candidates (observed network
//! requests, rendered DOM anchors, or anchors of fetched HTML), filter them
//! with a predicate, deduplicate and sort, then write an `.xlsx` report.

pub mod acquisition;
pub mod cli;
pub mod error;
pub mod extraction;
pub mod live;
pub mod renderer;
pub mod report;
