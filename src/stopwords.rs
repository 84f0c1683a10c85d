//! The canonical English stop-word list consulted by the Text Normalizer (C6, step 5).
//!
//! Reproduced from NLTK's `stopwords.words('english')` corpus (the list
//! `original_source/data_parser/content_parser.py` loads via `nltk.corpus.stopwords`), so
//! this crate has no runtime dependency on an NLTK data download. Any equivalent list of
//! equivalent size and content is acceptable per spec §4.6; this is the system parameter.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn has_no_duplicates() {
        let set: HashSet<&str> = ENGLISH_STOP_WORDS.iter().copied().collect();
        assert_eq!(set.len(), ENGLISH_STOP_WORDS.len());
    }

    #[test]
    fn matches_nltk_size() {
        // NLTK's stopwords.words('english') ships 179 entries.
        assert_eq!(ENGLISH_STOP_WORDS.len(), 179);
    }
}
