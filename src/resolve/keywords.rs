use chrono::NaiveDate;
use std::collections::HashMap;
use crate::core::EngineError;

/// Parse the run-time keyword string: `@`-separated `key=value` tokens, any
/// whitespace inside a token stripped. Example:
/// `@cob=20180403 @region=emea` -> {cob: 20180403, region: emea}.
pub fn parse_keyword_string(input: &str) -> Result<HashMap<String, String>, EngineError> {
    let mut keywords = HashMap::new();
    for token in input.split('@').skip(1) {
        let token: String = token.chars().filter(|c| !c.is_whitespace()).collect();
        if token.is_empty() {
            continue;
        }
        let (key, value) = token.split_once('=').ok_or_else(|| {
            EngineError::Config(format!("keyword token '{token}' is not key=value"))
        })?;
        keywords.insert(key.to_string(), value.to_string());
    }
    Ok(keywords)
}

/// If a `cob` keyword is present (close-of-business date, YYYYMMDD), derive
/// the date-part keywords used by path templates: yy, yyyy, mm, mmm, dd.
pub fn derive_cob_keywords(keywords: &mut HashMap<String, String>) -> Result<(), EngineError> {
    let Some(cob) = keywords.get("cob") else {
        return Ok(());
    };
    let date = NaiveDate::parse_from_str(cob, "%Y%m%d")
        .map_err(|_| EngineError::Config(format!("cob '{cob}' is not a YYYYMMDD date")))?;

    keywords.insert("yy".to_string(), date.format("%y").to_string());
    keywords.insert("yyyy".to_string(), date.format("%Y").to_string());
    keywords.insert("mm".to_string(), date.format("%m").to_string());
    keywords.insert("mmm".to_string(), date.format("%b").to_string());
    keywords.insert("dd".to_string(), date.format("%d").to_string());
    Ok(())
}

/// Full keyword pipeline: parse the CLI string, then derive CoB date parts.
pub fn parse_keywords(input: &str) -> Result<HashMap<String, String>, EngineError> {
    let mut keywords = parse_keyword_string(input)?;
    derive_cob_keywords(&mut keywords)?;
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        let kw = parse_keyword_string("@cob=20180403@region=emea").unwrap();
        assert_eq!(kw["cob"], "20180403");
        assert_eq!(kw["region"], "emea");
    }

    #[test]
    fn test_whitespace_is_stripped() {
        let kw = parse_keyword_string("@cob = 2018 0403 @ region=emea").unwrap();
        assert_eq!(kw["cob"], "20180403");
        assert_eq!(kw["region"], "emea");
    }

    #[test]
    fn test_token_without_equals_is_fatal() {
        assert!(parse_keyword_string("@justakey").is_err());
    }

    #[test]
    fn test_cob_derivation() {
        let mut kw = parse_keyword_string("@cob=20180403").unwrap();
        derive_cob_keywords(&mut kw).unwrap();
        assert_eq!(kw["yy"], "18");
        assert_eq!(kw["yyyy"], "2018");
        assert_eq!(kw["mm"], "04");
        assert_eq!(kw["mmm"], "Apr");
        assert_eq!(kw["dd"], "03");
    }

    #[test]
    fn test_malformed_cob_is_fatal() {
        let mut kw = parse_keyword_string("@cob=2018-04-03").unwrap();
        assert!(derive_cob_keywords(&mut kw).is_err());
    }

    #[test]
    fn test_no_cob_is_fine() {
        let mut kw = parse_keyword_string("@region=emea").unwrap();
        derive_cob_keywords(&mut kw).unwrap();
        assert!(!kw.contains_key("yyyy"));
    }
}
