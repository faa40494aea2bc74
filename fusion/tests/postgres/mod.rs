mod dedup_test;
mod store_test;
