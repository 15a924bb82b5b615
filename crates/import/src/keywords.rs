/// Static keyword → category fallback, consulted by the ingestion path when
/// no user rule matched so a draft never lands with an empty category.
/// Checked top to bottom by substring containment against the uppercased
/// description; the first hit wins.
const KEYWORD_CATEGORIES: &[(&[&str], &str)] = &[
    (
        &[
            "GROCER", "SUPERMARKET", "WHOLE FOODS", "TRADER JOE", "KROGER", "SAFEWAY", "ALDI",
            "COSTCO", "WALMART", "WEGMANS",
        ],
        "Groceries",
    ),
    (
        &[
            "RESTAURANT", "PIZZA", "CAFE", "COFFEE", "STARBUCKS", "CHIPOTLE", "MCDONALD",
            "BURGER", "TACO", "DOORDASH", "UBER EATS", "GRUBHUB", "SUSHI",
        ],
        "Dining",
    ),
    (
        &[
            "UBER", "LYFT", "SHELL", "CHEVRON", "EXXON", "FUEL", "PARKING", "TRANSIT", "METRO",
            "AMTRAK", "TOLL",
        ],
        "Transportation",
    ),
    (
        &[
            "NETFLIX", "SPOTIFY", "HULU", "DISNEY", "HBO", "YOUTUBE", "APPLE.COM/BILL",
            "PRIME VIDEO", "AUDIBLE", "STEAM",
        ],
        "Entertainment",
    ),
    (
        &[
            "PHARMACY", "CVS", "WALGREENS", "DOCTOR", "MEDICAL", "DENTAL", "CLINIC", "HOSPITAL",
            "OPTOMETR",
        ],
        "Healthcare",
    ),
    (&["RENT", "MORTGAGE", "LANDLORD", "APARTMENT", "HOA DUES"], "Housing"),
    (
        &[
            "ELECTRIC", "WATER BILL", "SEWER", "INTERNET", "COMCAST", "XFINITY", "VERIZON",
            "AT&T", "T-MOBILE", "UTILITY",
        ],
        "Utilities",
    ),
    (
        &["AMAZON", "TARGET", "BEST BUY", "EBAY", "ETSY", "NORDSTROM", "MACY"],
        "Shopping",
    ),
    (
        &["PAYROLL", "DIRECT DEP", "SALARY", "PAYCHECK", "EMPLOYER"],
        "Income",
    ),
    (
        &["INSURANCE", "GEICO", "ALLSTATE", "PROGRESSIVE", "STATE FARM"],
        "Insurance",
    ),
];

pub const FALLBACK_CATEGORY: &str = "Other";

pub fn fallback_category(description: &str) -> &'static str {
    let upper = description.to_uppercase();
    for (keywords, category) in KEYWORD_CATEGORIES {
        if keywords.iter().any(|keyword| upper.contains(keyword)) {
            return category;
        }
    }
    FALLBACK_CATEGORY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_are_case_insensitive() {
        assert_eq!(fallback_category("starbucks store 0117"), "Dining");
        assert_eq!(fallback_category("Trader Joe's #552"), "Groceries");
    }

    #[test]
    fn first_listed_group_wins() {
        // WALMART sits in the groceries group, ahead of generic shopping.
        assert_eq!(fallback_category("WALMART SUPERCENTER"), "Groceries");
        // UBER EATS is listed under dining before UBER under transportation.
        assert_eq!(fallback_category("UBER EATS ORDER 4412"), "Dining");
        assert_eq!(fallback_category("UBER TRIP 9983"), "Transportation");
    }

    #[test]
    fn unknown_descriptions_fall_back_to_other() {
        assert_eq!(fallback_category("ZZZ UNKNOWN MERCHANT"), "Other");
        assert_eq!(fallback_category(""), "Other");
    }

    #[test]
    fn income_keywords() {
        assert_eq!(fallback_category("ACME CORP PAYROLL 0412"), "Income");
    }
}
