mod tests_ordering;
