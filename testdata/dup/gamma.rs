use std::collections::HashMap;

pub fn count_words(text: &str) -> HashMap<String, usize> {
    let mut tally = HashMap::new();
    for word in text.split_whitespace() {
        *tally.entry(word.to_string()).or_insert(0) += 1;
    }
    tally
}

pub fn total(tally: &HashMap<String, usize>) -> usize {
    tally.values().sum()
}
