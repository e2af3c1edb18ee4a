mod outcomes;
mod responses;
mod sessions;
mod summaries;

pub use responses::response_ref;
