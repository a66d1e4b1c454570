use std::collections::HashMap;


pub fn count_words(text: &str) -> HashMap<String, usize> {
  let mut counts = HashMap::new();
  for word in text.split_whitespace() {
      *counts.entry(word.to_string()).or_insert(0) += 1;
  }
  counts
}

pub fn total(counts: &HashMap<String, usize>) -> usize {
  counts.values().sum()
}
