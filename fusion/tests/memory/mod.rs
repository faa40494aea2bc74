mod fusion_test;
mod support;
mod union_test;
