pub(crate) mod date;

pub(crate) use date::{bucket_for, day_of};
