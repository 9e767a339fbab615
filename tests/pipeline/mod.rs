mod snowflake_tests;
mod sync_tests;
