//! Static vocabularies the term strategies draw from.
//!
//! Weighting policy lives in `strategies.rs`; these are the raw pools. The
//! single-word pools deliberately favor 4-6 character tokens, which the
//! upstream full-text matcher handles well.

/// Common given names.
pub const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Linda", "David", "Susan", "Maria", "Carlos", "Kevin", "Laura",
    "Brian", "Karen", "Jason", "Nancy", "Maria", "Jorge", "Diane", "Frank", "Alice", "Pedro",
    "Grace", "Henry", "Rosa", "Luis", "Elena", "Peter", "Diana", "Oscar", "Irene", "Victor",
    "Celia", "Ramon", "Wanda", "Felix", "Norma", "Angel", "Gloria", "Edgar", "Sonia", "Hugo",
];

/// Common surnames.
pub const SURNAMES: &[&str] = &[
    "Smith", "Brown", "Jones", "Davis", "Wilson", "Moore", "Taylor", "White", "Harris", "Clark",
    "Lewis", "Walker", "Young", "Allen", "King", "Wright", "Scott", "Green", "Baker", "Adams",
    "Nelson", "Hill", "Campbell", "Mitchell", "Carter", "Roberts", "Turner", "Parker", "Evans",
    "Collins", "Stewart", "Morris", "Murphy", "Cook", "Rogers", "Bell", "Bailey", "Cooper",
    "Howard", "Ward", "Brooks", "Gray", "Price", "Wood", "Watson", "Russell", "Hughes", "Foster",
];

/// Surname subsets that historically return dense result sets; sampled with
/// their own strategy so their weight is tunable independently.
pub const HIGH_YIELD_SURNAMES: &[&str] = &[
    "Garcia", "Martinez", "Rodriguez", "Hernandez", "Lopez", "Gonzalez", "Perez", "Sanchez",
    "Ramirez", "Torres", "Flores", "Rivera", "Gomez", "Diaz", "Reyes", "Morales", "Cruz",
    "Ortiz", "Gutierrez", "Chavez", "Ramos", "Ruiz", "Mendoza", "Nguyen", "Tran", "Patel",
    "Kim", "Singh", "Chen", "Vargas",
];

/// Street base names.
pub const STREET_NAMES: &[&str] = &[
    "Oak", "Cedar", "Maple", "Pine", "Elm", "Walnut", "Willow", "Aspen", "Birch", "Juniper",
    "Mesquite", "Pecan", "Cypress", "Magnolia", "Laurel", "Sycamore", "Redbud", "Cottonwood",
    "Bluebonnet", "Sunset", "Meadow", "Ridge", "Summit", "Valley", "Canyon", "Lakeview",
];

/// Street-type suffixes used by the composite street strategy.
pub const STREET_SUFFIXES: &[&str] = &[
    "Ln", "Dr", "Rd", "St", "Ave", "Blvd", "Cv", "Trl", "Pass", "Bend", "Loop", "Path",
];

/// Landform and water terms common in legal descriptions and addresses.
pub const GEOGRAPHIC_TERMS: &[&str] = &[
    "Creek", "River", "Lake", "Hill", "Spring", "Bluff", "Mesa", "Prairie", "Hollow", "Grove",
    "Glen", "Crossing", "Branch", "Falls", "Point", "Cove",
];

/// Area and subdivision names around the county.
pub const NEIGHBORHOODS: &[&str] = &[
    "Mueller", "Zilker", "Tarrytown", "Allandale", "Crestview", "Rosedale", "Pemberton",
    "Westlake", "Barton", "Hyde", "Travis", "Lakeway", "Manor", "Pflugerville", "Leander",
];

/// Property-type descriptors.
pub const PROPERTY_TYPES: &[&str] = &[
    "Condo", "Duplex", "Ranch", "Farm", "Tract", "Acres", "Unit", "Estates", "Villas", "Lofts",
];

/// Legal suffixes that mark a company-style composite term. Matched by
/// prefix so "Holdings" folds into "Holding".
pub const BUSINESS_SUFFIXES: &[&str] = &[
    "llc", "inc", "corp", "ltd", "trust", "holding", "properties", "partner", "develop",
    "company", "real", "assoc",
];

/// Closed denylist of tokens known to overload the upstream full-text index.
/// Single-character terms are rejected structurally, separately from this
/// list.
pub const TOO_COMMON: &[&str] = &[
    "austin", "texas", "county", "the", "and", "of", "st", "dr", "ln", "rd", "street", "drive",
    "lane", "road", "llc", "inc", "trust",
];
