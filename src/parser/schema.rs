//! The lawyer-profile schema: one cascade per output field.
//!
//! Profile pages come in at least three layouts (desktop box cards,
//! label/value rows, collapsed mobile panels), so most fields list one
//! strategy per layout, most specific first.

use super::cascade::{FieldKind, FieldSpec};
use super::strategy::{Matcher, Region, Strategy, Transform};
use crate::error::SchemaError;

pub const NAME: &str = "name";
pub const IS_VERIFIED: &str = "is_verified";
pub const IMG_URL: &str = "img_url";
pub const RATING: &str = "rating";
pub const RATING_COUNT: &str = "rating_count";
pub const CONTACT_NUMBER: &str = "contact_number";
pub const LOCATION: &str = "location";
pub const EXPERIENCE: &str = "experience";
pub const LANGUAGES: &str = "languages";
pub const PRACTICE_AREAS: &str = "practice_areas";
pub const ABOUT: &str = "about";
pub const SPECIALIZATION: &str = "specialization";
pub const COURTS: &str = "courts";
pub const POPULAR_REVIEWS: &str = "popular_reviews";
pub const QUESTIONS_ANSWERED: &str = "questions_answered";
pub const FAQ: &str = "faq";

const BOX: &str = "div.box-card";
const BOX_HEADING: &str = "h3, h2";
const MOBILE: &str = "div.mobile-info";
const MOBILE_LABEL: &str = ".label-detail";

pub fn profile(base_url: &str) -> Result<Vec<FieldSpec>, SchemaError> {
    Ok(vec![
        FieldSpec::new(IS_VERIFIED, FieldKind::Flag, vec![
            Strategy::select(".verified-badge, .badge-verified, .lawyer-verified")?,
            Strategy::select(".verified")?,
        ]),
        FieldSpec::new(NAME, FieldKind::Text, vec![
            Strategy::select("h1.media-heading")?,
            Strategy::select(".media-heading")?,
            Strategy::select(".lawyer-profile h1")?,
        ])
        .required(),
        FieldSpec::new(IMG_URL, FieldKind::Text, vec![
            Strategy::new(Region::Whole, Matcher::attr("img.media-object.img-responsive", "src")?)
                .then(Transform::Absolutize(base_url.to_string())),
        ]),
        FieldSpec::new(RATING, FieldKind::Number, vec![
            Strategy::labelled("span", "Rating")?.then(Transform::capture(r"([0-9]+\.?[0-9]*)")?),
            Strategy::select(".score")?.then(Transform::First),
        ]),
        FieldSpec::new(RATING_COUNT, FieldKind::Text, vec![
            Strategy::labelled("span", "Rating")?.then(Transform::capture(r"\(([0-9]+\+?)\)")?),
            Strategy::select(".score")?
                .then(Transform::Nth(1))
                .then(Transform::capture(r"([0-9]+)")?)
                .then(Transform::replace(r"^([0-9]+)$", "$1+")?),
        ]),
        FieldSpec::new(CONTACT_NUMBER, FieldKind::Text, vec![
            Strategy::labelled("span", "Contact Number")?.then(Transform::remove("Contact Number:")),
            Strategy::labelled("span", "Phone")?.then(Transform::remove("Phone:")),
            Strategy::new(Region::anchored("a", "CONTACT", 0)?, Matcher::Text)
                .then(Transform::capture(r"([0-9]+\*+[0-9]+)")?),
            Strategy::new(Region::anchored("a", "Phone", 0)?, Matcher::Text)
                .then(Transform::capture(r"([0-9]+\*+[0-9]+)")?),
            Strategy::new(Region::select(".lawyer-profile, .mobile-info")?, Matcher::pattern(r"\b([0-9]{2,}\*{2,}[0-9]{2,})\b")?)
                .then(Transform::First),
        ]),
        FieldSpec::new(LOCATION, FieldKind::Text, vec![
            Strategy::labelled("span", "Location")?.then(Transform::remove("Location:")),
            Strategy::labelled("span", "Address")?.then(Transform::remove("Address:")),
        ]),
        FieldSpec::new(EXPERIENCE, FieldKind::Text, vec![
            Strategy::labelled("span", "Experience")?
                .then(Transform::remove("Experience:"))
                .then(Transform::Collapse)
                .then(Transform::replace(r"(?i)([0-9]+\s*years).*$", "$1")?),
        ]),
        FieldSpec::new(LANGUAGES, FieldKind::List, vec![
            Strategy::labelled("span", "Languages")?
                .then(Transform::remove("Languages:"))
                .then(Transform::split(",")),
            Strategy::new(Region::anchored("div.item-info", "Languages", 0)?, Matcher::Text)
                .then(Transform::replace(r"(?i)Languages:?", "")?)
                .then(Transform::split(",")),
        ]),
        FieldSpec::new(PRACTICE_AREAS, FieldKind::List, vec![
            Strategy::labelled("span", "Practice Area")?
                .then(Transform::replace(r"(?i)Practice Areas?:?", "")?)
                .then(Transform::split(",")),
            Strategy::new(Region::anchored("div.item-info", "Practice", 0)?, Matcher::Text)
                .then(Transform::replace(r"(?i)Practice areas?:?", "")?)
                .then(Transform::split(",")),
            Strategy::new(
                Region::keyed(MOBILE, MOBILE_LABEL, "Practice Areas")?,
                Matcher::text_without(MOBILE_LABEL)?,
            )
            .then(Transform::split(",")),
        ]),
        FieldSpec::new(ABOUT, FieldKind::List, vec![
            Strategy::new(Region::headed(BOX, BOX_HEADING, &["About"])?, Matcher::select("p")?),
            Strategy::new(
                Region::headed(BOX, BOX_HEADING, &["About"])?,
                Matcher::text_without(BOX_HEADING)?,
            ),
            Strategy::new(Region::select(".profile-summary")?, Matcher::Text).then(Transform::Lines),
            Strategy::new(Region::keyed(MOBILE, MOBILE_LABEL, "About")?, Matcher::text_without(MOBILE_LABEL)?),
        ]),
        FieldSpec::new(SPECIALIZATION, FieldKind::Text, vec![
            Strategy::new(
                Region::headed(BOX, BOX_HEADING, &["Specialization", "Expertise"])?,
                Matcher::text_without(BOX_HEADING)?,
            ),
            Strategy::new(
                Region::anchored("div.label-detail", "Specialization", 0)?,
                Matcher::sibling("div", 1)?,
            ),
            Strategy::new(
                Region::anchored("div.label-detail", "Specialization", 1)?,
                Matcher::sibling("*", 1)?,
            ),
            Strategy::new(Region::keyed(MOBILE, MOBILE_LABEL, "Specialization")?, Matcher::select(".panel1")?),
            Strategy::new(Region::keyed(MOBILE, MOBILE_LABEL, "Specialization")?, Matcher::select("li")?)
                .then(Transform::Join(", ".into())),
            Strategy::new(
                Region::keyed(MOBILE, MOBILE_LABEL, "Specialization")?,
                Matcher::text_without(MOBILE_LABEL)?,
            ),
        ]),
        FieldSpec::new(COURTS, FieldKind::List, vec![
            Strategy::new(Region::headed(BOX, BOX_HEADING, &["Court"])?, Matcher::select("li")?),
            Strategy::new(Region::headed(BOX, BOX_HEADING, &["Court"])?, Matcher::text_without(BOX_HEADING)?),
            Strategy::new(Region::anchored("div.label-detail", "Courts", 0)?, Matcher::sibling("div", 1)?)
                .then(Transform::split(",")),
            Strategy::select("ul.list-court li")?,
        ]),
        FieldSpec::new(POPULAR_REVIEWS, FieldKind::Records(review_fields()?), vec![
            Strategy::new(
                Region::headed(BOX, BOX_HEADING, &["Review", "Testimonial"])?,
                Matcher::select(".review-box, .review-item, .testimonial")?,
            ),
            Strategy::select(".review-item, .review-box, .testimonial, .client-review")?,
        ]),
        FieldSpec::new(QUESTIONS_ANSWERED, FieldKind::Records(question_fields()?), vec![
            Strategy::new(
                Region::headed(BOX, BOX_HEADING, &["Question", "Answer"])?,
                Matcher::select(".qa-item, .question-answer, .answered-question")?,
            ),
            Strategy::new(Region::anchored("h2", "Questions Answered", 2)?, Matcher::select("h5")?),
        ]),
        FieldSpec::new(FAQ, FieldKind::Records(faq_fields()?), vec![
            Strategy::new(
                Region::headed(BOX, BOX_HEADING, &["FAQ"])?,
                Matcher::select(".faq-item, .qa-item, .faq-qa")?,
            ),
            Strategy::select(r#"[itemtype*="Question"]"#)?,
            Strategy::new(Region::anchored("h2", "FAQ", 2)?, Matcher::select("h2.faq-question")?),
        ]),
    ])
}

fn review_fields() -> Result<Vec<FieldSpec>, SchemaError> {
    Ok(vec![
        FieldSpec::new("name", FieldKind::Text, vec![
            Strategy::select(".reviewer-name, .client-name, .author")?
                .then(Transform::replace(r"(?i)\s*-\s*Verified Client.*$", "")?),
        ]),
        FieldSpec::new("verified_client", FieldKind::Flag, vec![
            Strategy::select(".verified-client, .verified, .is-verified")?,
        ]),
        FieldSpec::new("review", FieldKind::Text, vec![
            Strategy::select(".review-text, .testimonial-text, .review-content")?,
        ]),
        FieldSpec::new("age", FieldKind::Text, vec![
            Strategy::select(".review-date, .date, .time-ago, .review-timestamp")?,
        ]),
    ])
}

fn question_fields() -> Result<Vec<FieldSpec>, SchemaError> {
    Ok(vec![
        FieldSpec::new("question", FieldKind::Text, vec![
            Strategy::select(".question-title, .q-title, .question-heading")?,
            Strategy::new(Region::own("h5")?, Matcher::Text)
                .then(Transform::replace(r"(?i)Q:|Question:", "")?),
        ]),
        FieldSpec::new("details", FieldKind::Text, vec![
            Strategy::select(".question-detail, .q-text, .question-content")?,
            Strategy::new(Region::own("h5")?, Matcher::sibling("p", 1)?),
        ]),
        FieldSpec::new("answer", FieldKind::Text, vec![
            Strategy::select(".answer-text, .a-text, .lawyer-answer")?,
            Strategy::new(Region::own("h5")?, Matcher::sibling("p", 2)?)
                .then(Transform::capture(r"(?is).*answered[:\s]*(.*)")?),
        ]),
    ])
}

fn faq_fields() -> Result<Vec<FieldSpec>, SchemaError> {
    Ok(vec![
        FieldSpec::new("question", FieldKind::Text, vec![
            Strategy::select(".faq-question, .q-text, .question")?,
            Strategy::select(r#"[itemprop="name"]"#)?,
            Strategy::new(Region::own("h2.faq-question")?, Matcher::Text),
        ]),
        FieldSpec::new("answer", FieldKind::Text, vec![
            Strategy::select(".faq-answer, .a-text, .answer")?,
            Strategy::select(r#"[itemprop="text"]"#)?,
            Strategy::new(Region::own("h2.faq-question")?, Matcher::sibling("div", 1)?),
        ]),
    ])
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::cascade::extract;
    use crate::record::{FieldMap, FieldValue};
    use scraper::Html;

    fn fixture(name: &str) -> FieldMap {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        let schema = profile("https://lawrato.com").unwrap();
        extract(&Html::parse_document(&html), &schema)
    }

    fn text(fields: &FieldMap, name: &str) -> String {
        fields[name].as_text().unwrap_or_default().to_string()
    }

    fn list(fields: &FieldMap, name: &str) -> Vec<String> {
        match &fields[name] {
            FieldValue::List(items) => items.clone(),
            other => panic!("{} is not a list: {:?}", name, other),
        }
    }

    fn records(fields: &FieldMap, name: &str) -> Vec<FieldMap> {
        match &fields[name] {
            FieldValue::Records(entries) => entries.clone(),
            other => panic!("{} is not records: {:?}", name, other),
        }
    }

    #[test]
    fn schema_compiles_and_covers_downstream_names() {
        let schema = profile("https://lawrato.com").unwrap();
        let names: Vec<&str> = schema.iter().map(|f| f.name.as_str()).collect();
        for required in [
            NAME, LOCATION, EXPERIENCE, RATING, LANGUAGES, PRACTICE_AREAS, COURTS, ABOUT,
            POPULAR_REVIEWS, QUESTIONS_ANSWERED, FAQ,
        ] {
            assert!(names.contains(&required), "missing {}", required);
        }
        assert!(schema.iter().find(|f| f.name == NAME).unwrap().required);
    }

    #[test]
    fn desktop_profile() {
        let f = fixture("profile_full");
        assert_eq!(text(&f, NAME), "Advocate Rajesh K S");
        assert_eq!(f[IS_VERIFIED], FieldValue::Flag(true));
        assert_eq!(text(&f, IMG_URL), "https://lawrato.com/images/rajesh.jpg");
        assert_eq!(f[RATING], FieldValue::Number(4.5));
        assert_eq!(text(&f, RATING_COUNT), "120+");
        assert_eq!(text(&f, LOCATION), "Bangalore, Karnataka");
        assert_eq!(text(&f, EXPERIENCE), "18 years");
        assert_eq!(text(&f, CONTACT_NUMBER), "98****10");
        assert_eq!(list(&f, LANGUAGES), vec!["English", "Hindi", "Kannada"]);
        assert_eq!(list(&f, PRACTICE_AREAS), vec!["Divorce", "Family", "Property"]);
        assert_eq!(list(&f, ABOUT).len(), 2);
        assert_eq!(text(&f, SPECIALIZATION), "Divorce | Child Custody | Property");
        assert_eq!(list(&f, COURTS), vec!["Karnataka High Court", "Family Court, Bangalore"]);
    }

    #[test]
    fn desktop_profile_nested_sections() {
        let f = fixture("profile_full");

        let reviews = records(&f, POPULAR_REVIEWS);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0]["name"], FieldValue::Text("Suresh".into()));
        assert_eq!(reviews[0]["verified_client"], FieldValue::Flag(true));
        assert_eq!(reviews[1]["verified_client"], FieldValue::Flag(false));
        assert_eq!(reviews[1]["age"], FieldValue::Text("3 months ago".into()));

        let qa = records(&f, QUESTIONS_ANSWERED);
        assert_eq!(qa.len(), 1);
        assert_eq!(qa[0]["question"], FieldValue::Text("Can I get custody of my child?".into()));
        assert_eq!(qa[0]["answer"], FieldValue::Text("Yes, the court considers the welfare of the child.".into()));

        let faq = records(&f, FAQ);
        assert_eq!(faq.len(), 2);
        assert_eq!(faq[1]["question"], FieldValue::Text("What are the fees?".into()));
    }

    #[test]
    fn fallback_layout_profile() {
        let f = fixture("profile_mobile");
        assert_eq!(text(&f, NAME), "Advocate Meera Nair");
        assert_eq!(f[IS_VERIFIED], FieldValue::Flag(false));
        assert_eq!(f[RATING], FieldValue::Number(4.8));
        assert_eq!(text(&f, RATING_COUNT), "75+");
        assert_eq!(text(&f, IMG_URL), "https://cdn.lawrato.com/meera.png");
        assert_eq!(list(&f, LANGUAGES), vec!["English", "Malayalam"]);
        assert_eq!(list(&f, PRACTICE_AREAS), vec!["Criminal", "Cyber Crime"]);
        assert_eq!(list(&f, ABOUT), vec!["Practising in Kochi since 2010.", "Focus on criminal defence."]);
        assert_eq!(text(&f, SPECIALIZATION), "Criminal Defence, Bail");
        assert_eq!(list(&f, COURTS), vec!["Kerala High Court", "Sessions Court Kochi"]);

        let qa = records(&f, QUESTIONS_ANSWERED);
        assert_eq!(qa.len(), 2);
        assert_eq!(qa[0]["question"], FieldValue::Text("How long does bail take?".into()));
        assert_eq!(qa[0]["details"], FieldValue::Text("My brother was arrested yesterday.".into()));
        assert_eq!(qa[0]["answer"], FieldValue::Text("Usually within a week.".into()));

        let faq = records(&f, FAQ);
        assert_eq!(faq.len(), 1);
        assert_eq!(faq[0]["answer"], FieldValue::Text("Yes, online consultations are available.".into()));
    }

    #[test]
    fn missing_sections_are_gaps() {
        let f = fixture("profile_no_rating");
        assert_eq!(text(&f, NAME), "Advocate Priya Sharma");
        assert_eq!(f[RATING], FieldValue::Null);
        assert_eq!(text(&f, RATING_COUNT), "");
        assert!(records(&f, POPULAR_REVIEWS).is_empty());
        assert_eq!(text(&f, LOCATION), "Mumbai, Maharashtra");
    }
}
