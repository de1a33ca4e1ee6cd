//! Country/currency/ISIN-prefix lookup tables shared by the Scraper, the Resolver, and the
//! Aggregator's country dimension. Grounded on
//! `original_source/src/etf_detail_generator.py`'s `COUNTRY_TO_CURRENCY` and
//! `original_source/src/risk_calculator.py`'s `_currency_to_country` / `_country_code_to_name`
//! / `_get_stock_currency`.

/// Country display name (as it appears in a scraped allocation table) -> ISO-4217 currency.
/// Eurozone members fold into EUR (§4.2 item 6).
pub fn country_to_currency(country: &str) -> Option<&'static str> {
    const MAP: &[(&str, &str)] = &[
        ("united states", "USD"),
        ("usa", "USD"),
        ("united kingdom", "GBP"),
        ("uk", "GBP"),
        ("japan", "JPY"),
        ("switzerland", "CHF"),
        ("china", "CNY"),
        ("hong kong", "HKD"),
        ("canada", "CAD"),
        ("australia", "AUD"),
        ("south korea", "KRW"),
        ("korea", "KRW"),
        ("taiwan", "TWD"),
        ("india", "INR"),
        ("brazil", "BRL"),
        ("south africa", "ZAR"),
        ("sweden", "SEK"),
        ("norway", "NOK"),
        ("denmark", "DKK"),
        ("poland", "PLN"),
        ("mexico", "MXN"),
        ("singapore", "SGD"),
        ("germany", "EUR"),
        ("france", "EUR"),
        ("netherlands", "EUR"),
        ("italy", "EUR"),
        ("spain", "EUR"),
        ("ireland", "EUR"),
        ("belgium", "EUR"),
        ("finland", "EUR"),
        ("austria", "EUR"),
        ("portugal", "EUR"),
        ("greece", "EUR"),
        ("luxembourg", "EUR"),
        ("cyprus", "EUR"),
        ("malta", "EUR"),
        ("slovenia", "EUR"),
        ("slovakia", "EUR"),
        ("estonia", "EUR"),
        ("latvia", "EUR"),
        ("lithuania", "EUR"),
        ("czech republic", "CZK"),
        ("czechia", "CZK"),
        ("hungary", "HUF"),
        ("romania", "RON"),
        ("turkey", "TRY"),
        ("russia", "RUB"),
        ("iceland", "ISK"),
        ("indonesia", "IDR"),
        ("thailand", "THB"),
        ("malaysia", "MYR"),
        ("philippines", "PHP"),
        ("vietnam", "VND"),
        ("pakistan", "PKR"),
        ("bangladesh", "BDT"),
        ("sri lanka", "LKR"),
        ("new zealand", "NZD"),
        ("saudi arabia", "SAR"),
        ("united arab emirates", "AED"),
        ("israel", "ILS"),
        ("qatar", "QAR"),
        ("kuwait", "KWD"),
        ("argentina", "ARS"),
        ("chile", "CLP"),
        ("colombia", "COP"),
        ("peru", "PEN"),
        ("nigeria", "NGN"),
        ("kenya", "KES"),
        ("egypt", "EGP"),
        ("morocco", "MAD"),
    ];
    let lower = country.to_lowercase();
    MAP.iter().find(|(name, _)| *name == lower).map(|(_, c)| *c)
}

/// Currency -> a representative country name, used by the country dimension's Cash-via-currency
/// fallback (§4.6 item 5b) and the strict/permissive currency dimensions' labelling.
pub fn currency_to_country(currency: &str) -> Option<&'static str> {
    const MAP: &[(&str, &str)] = &[
        ("USD", "United States"),
        ("EUR", "Germany"),
        ("GBP", "United Kingdom"),
        ("JPY", "Japan"),
        ("CHF", "Switzerland"),
        ("CNY", "China"),
        ("HKD", "Hong Kong"),
        ("CAD", "Canada"),
        ("AUD", "Australia"),
        ("KRW", "South Korea"),
        ("TWD", "Taiwan"),
        ("INR", "India"),
        ("BRL", "Brazil"),
        ("ZAR", "South Africa"),
        ("SEK", "Sweden"),
        ("NOK", "Norway"),
        ("DKK", "Denmark"),
        ("PLN", "Poland"),
        ("MXN", "Mexico"),
        ("SGD", "Singapore"),
    ];
    MAP.iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(currency))
        .map(|(_, name)| *name)
}

/// First two characters of an identifier (ISO-3166-alpha-2) -> country display name.
pub fn country_code_to_name(code: &str) -> Option<&'static str> {
    const MAP: &[(&str, &str)] = &[
        ("US", "United States"),
        ("GB", "United Kingdom"),
        ("DE", "Germany"),
        ("FR", "France"),
        ("NL", "Netherlands"),
        ("IT", "Italy"),
        ("ES", "Spain"),
        ("IE", "Ireland"),
        ("CH", "Switzerland"),
        ("JP", "Japan"),
        ("CN", "China"),
        ("HK", "Hong Kong"),
        ("CA", "Canada"),
        ("AU", "Australia"),
        ("KR", "South Korea"),
        ("TW", "Taiwan"),
        ("IN", "India"),
        ("BR", "Brazil"),
        ("ZA", "South Africa"),
        ("SE", "Sweden"),
        ("NO", "Norway"),
        ("DK", "Denmark"),
        ("PL", "Poland"),
        ("MX", "Mexico"),
        ("SG", "Singapore"),
        ("BE", "Belgium"),
        ("FI", "Finland"),
        ("AT", "Austria"),
        ("PT", "Portugal"),
        ("GR", "Greece"),
        ("LU", "Luxembourg"),
        ("CY", "Cyprus"),
        ("MT", "Malta"),
        ("SI", "Slovenia"),
        ("SK", "Slovakia"),
        ("EE", "Estonia"),
        ("LV", "Latvia"),
        ("LT", "Lithuania"),
        ("CZ", "Czech Republic"),
        ("HU", "Hungary"),
        ("RO", "Romania"),
        ("TR", "Turkey"),
        ("RU", "Russia"),
        ("IS", "Iceland"),
        ("ID", "Indonesia"),
        ("TH", "Thailand"),
        ("MY", "Malaysia"),
        ("PH", "Philippines"),
        ("VN", "Vietnam"),
        ("PK", "Pakistan"),
        ("BD", "Bangladesh"),
        ("LK", "Sri Lanka"),
        ("NZ", "New Zealand"),
        ("SA", "Saudi Arabia"),
        ("AE", "United Arab Emirates"),
        ("IL", "Israel"),
        ("QA", "Qatar"),
        ("KW", "Kuwait"),
        ("AR", "Argentina"),
        ("CL", "Chile"),
        ("CO", "Colombia"),
        ("PE", "Peru"),
        ("NG", "Nigeria"),
        ("KE", "Kenya"),
        ("EG", "Egypt"),
        ("MA", "Morocco"),
    ];
    let upper = code.to_uppercase();
    MAP.iter().find(|(c, _)| *c == upper).map(|(_, n)| *n)
}

/// ISIN-prefix -> currency, used when a Stock's own currency should be overridden by the
/// identifier's country of domicile (§4.5 "For Stocks, override currency...").
pub fn identifier_prefix_to_currency(identifier: &str) -> Option<&'static str> {
    let prefix = identifier.get(0..2)?;
    let country = country_code_to_name(prefix)?;
    country_to_currency(country)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eurozone_countries_fold_into_eur() {
        assert_eq!(country_to_currency("France"), Some("EUR"));
        assert_eq!(country_to_currency("Ireland"), Some("EUR"));
    }

    #[test]
    fn identifier_prefix_resolves_via_country() {
        assert_eq!(identifier_prefix_to_currency("US0378331005"), Some("USD"));
        assert_eq!(identifier_prefix_to_currency("DE0005190003"), Some("EUR"));
    }

    #[test]
    fn unmapped_country_returns_none() {
        assert_eq!(country_to_currency("Atlantis"), None);
    }
}
