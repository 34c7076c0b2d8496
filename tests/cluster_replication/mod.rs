mod convergence_test;
mod partition_test;
