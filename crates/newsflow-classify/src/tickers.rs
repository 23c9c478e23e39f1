use std::collections::{BTreeSet, HashMap};

/// Upper-case words that look like symbols but almost never are in headlines.
const STOP_WORDS: &[&str] = &[
    "THE", "AND", "FOR", "ARE", "BUT", "NOT", "YOU", "ALL", "CAN", "HER", "WAS", "ONE", "OUR",
    "HAD", "BY", "NEWS", "STOCK", "TODAY", "WITH", "FROM", "WILL", "SAID", "THIS", "THAT",
    "THEY", "WERE", "BEEN", "HAVE", "DOES", "WHEN", "WHERE", "WHAT", "WHO", "HOW", "WHY",
    "WHICH", "SEC", "CEO", "CFO", "CTO", "IPO", "FDA", "API", "USA", "US", "UK", "EU", "AI",
    "GDP", "CPI", "ETF", "FED", "NYSE", "OPEC", "IMF", "EPS", "UPDATE", "BREAKING", "TO",
    "OF", "IN", "ON", "AT", "AS", "IS", "IT", "OR", "AN",
];

/// Company names recognised without an explicit symbol.
const COMPANY_NAMES: &[(&str, &str)] = &[
    ("apple", "AAPL"),
    ("apple inc", "AAPL"),
    ("microsoft", "MSFT"),
    ("amazon", "AMZN"),
    ("amazon.com", "AMZN"),
    ("google", "GOOGL"),
    ("alphabet", "GOOGL"),
    ("facebook", "META"),
    ("meta platforms", "META"),
    ("tesla", "TSLA"),
    ("netflix", "NFLX"),
    ("nvidia", "NVDA"),
    ("jpmorgan", "JPM"),
    ("jp morgan", "JPM"),
    ("goldman sachs", "GS"),
    ("bank of america", "BAC"),
    ("walmart", "WMT"),
    ("wal-mart", "WMT"),
    ("disney", "DIS"),
    ("coca-cola", "KO"),
    ("coca cola", "KO"),
    ("intel", "INTC"),
    ("advanced micro devices", "AMD"),
    ("ibm", "IBM"),
    ("berkshire hathaway", "BRK.A"),
    ("johnson & johnson", "JNJ"),
    ("procter & gamble", "PG"),
    ("visa", "V"),
    ("mastercard", "MA"),
    ("home depot", "HD"),
    ("pfizer", "PFE"),
    ("verizon", "VZ"),
    ("at&t", "T"),
    ("exxon", "XOM"),
    ("exxonmobil", "XOM"),
    ("chevron", "CVX"),
    ("oracle", "ORCL"),
    ("salesforce", "CRM"),
    ("adobe", "ADBE"),
    ("paypal", "PYPL"),
    ("boeing", "BA"),
    ("starbucks", "SBUX"),
    ("nike", "NKE"),
    ("mcdonald", "MCD"),
    ("ford", "F"),
    ("general motors", "GM"),
];

/// Extracts ticker symbols from headline text.
///
/// Three sources are combined: known company names, `$CASHTAG` mentions, and
/// bare 2-5 letter upper-case words that are not common acronyms.
pub struct TickerMapper {
    companies: HashMap<String, String>,
}

impl Default for TickerMapper {
    fn default() -> Self {
        Self::new(
            COMPANY_NAMES
                .iter()
                .map(|(name, ticker)| (name.to_string(), ticker.to_string())),
        )
    }
}

impl TickerMapper {
    pub fn new(companies: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            companies: companies
                .into_iter()
                .map(|(name, ticker)| (name.to_lowercase(), ticker.to_uppercase()))
                .collect(),
        }
    }

    /// Sorted, de-duplicated symbols mentioned in `text`.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut found = BTreeSet::new();

        let phrase_text = format!(" {} ", name_tokens(text).join(" "));
        for (name, ticker) in &self.companies {
            if phrase_text.contains(&format!(" {name} ")) {
                found.insert(ticker.clone());
            }
        }

        for raw in text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '$')) {
            if let Some(tag) = raw.strip_prefix('$') {
                if (1..=5).contains(&tag.len()) && tag.chars().all(|c| c.is_ascii_alphabetic()) {
                    found.insert(tag.to_uppercase());
                }
                continue;
            }
            if (2..=5).contains(&raw.len())
                && raw.chars().all(|c| c.is_ascii_uppercase())
                && !STOP_WORDS.contains(&raw)
            {
                found.insert(raw.to_string());
            }
        }

        found.into_iter().collect()
    }
}

/// Lower-case word tokens, keeping the punctuation that appears inside
/// company names (`at&t`, `coca-cola`, `amazon.com`).
fn name_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '&' || c == '.' || c == '-'))
        .map(|t| t.trim_matches(|c: char| c == '.' || c == '-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_name_maps_to_ticker() {
        let mapper = TickerMapper::default();
        assert_eq!(mapper.extract("Apple beats earnings, stock surges"), vec!["AAPL"]);
        assert_eq!(mapper.extract("Apple's new iPhone disappoints."), vec!["AAPL"]);
    }

    #[test]
    fn multi_word_and_punctuated_names() {
        let mapper = TickerMapper::default();
        assert_eq!(mapper.extract("Bank of America raises dividend"), vec!["BAC"]);
        assert_eq!(mapper.extract("AT&T and Verizon cut prices"), vec!["T", "VZ"]);
        assert_eq!(mapper.extract("Coca-Cola volumes slip"), vec!["KO"]);
    }

    #[test]
    fn name_must_be_whole_word() {
        let mapper = TickerMapper::default();
        assert!(mapper.extract("Pineapple prices climb").is_empty());
        assert!(mapper.extract("Affordable housing stalls").is_empty());
    }

    #[test]
    fn cashtags_and_bare_symbols() {
        let mapper = TickerMapper::default();
        assert_eq!(
            mapper.extract("$msft and NVDA lead chip rally"),
            vec!["MSFT", "NVDA"]
        );
    }

    #[test]
    fn acronyms_are_not_symbols() {
        let mapper = TickerMapper::default();
        assert!(mapper.extract("SEC charges CEO over IPO filing").is_empty());
        assert!(mapper.extract("US GDP beats forecasts").is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let mapper = TickerMapper::default();
        assert_eq!(
            mapper.extract("Tesla (TSLA) rallies as $TSLA shorts cover"),
            vec!["TSLA"]
        );
    }

    #[test]
    fn custom_mapping() {
        let mapper = TickerMapper::new([("Acme Corp".to_string(), "acme".to_string())]);
        assert_eq!(mapper.extract("acme corp wins contract"), vec!["ACME"]);
    }
}
