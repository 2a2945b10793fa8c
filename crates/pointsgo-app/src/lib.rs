// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod availability;
pub mod cache;
pub mod dates;
pub mod forms;
pub mod fuzzy;
pub mod ids;
pub mod model;
pub mod state;
pub mod table;

pub use availability::*;
pub use cache::*;
pub use dates::*;
pub use forms::*;
pub use fuzzy::*;
pub use ids::*;
pub use model::*;
pub use state::*;
pub use table::*;
