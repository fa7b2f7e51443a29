pub(crate) mod ping;
