use chrono::{TimeZone, Utc};

use crate::models::ReviewRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollegeKind {
    Private,
    Public,
}

impl CollegeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollegeKind::Private => "Private",
            CollegeKind::Public => "Public",
        }
    }
}

#[derive(Debug)]
pub struct Event {
    pub name: &'static str,
    pub date: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct SportsCategory {
    pub category: &'static str,
    pub sports: &'static [&'static str],
}

#[derive(Debug)]
pub struct College {
    pub id: u32,
    pub name: &'static str,
    pub location: &'static str,
    pub kind: CollegeKind,
    pub rating: f32,
    pub admission_date: &'static str,
    pub research_count: u32,
    pub students: &'static str,
    pub description: &'static str,
    pub admission_process: &'static str,
    pub programs: &'static [&'static str], // empty = not open for applications
    pub events: &'static [Event],
    pub research_works: &'static [&'static str],
    pub sports: &'static [SportsCategory],
    pub facilities: &'static [&'static str],
}

impl College {
    pub fn accepts_applications(&self) -> bool {
        !self.programs.is_empty()
    }

    pub fn offers(&self, program: &str) -> bool {
        self.programs.iter().any(|p| *p == program)
    }
}

static COLLEGES: &[College] = &[
    College {
        id: 1,
        name: "Harvard University",
        location: "Cambridge, MA",
        kind: CollegeKind::Private,
        rating: 4.9,
        admission_date: "Dec 1, 2024",
        research_count: 1250,
        students: "23,000+",
        description: "Harvard University is a private Ivy League research university in Cambridge, Massachusetts. Founded in 1636, Harvard is the oldest institution of higher education in the United States.",
        admission_process: "Holistic review of academic excellence, extracurricular activities, personal qualities and potential contributions to the community. Essays, recommendations and standardized test scores are required.",
        programs: &["Medicine", "Law", "Business", "Engineering", "Liberal Arts"],
        events: &[
            Event { name: "Harvard Science Fair", date: "March 15, 2025", description: "Annual showcase of student research projects" },
            Event { name: "Cultural Festival", date: "April 20, 2025", description: "Celebration of diversity and international cultures" },
            Event { name: "Innovation Summit", date: "May 10, 2025", description: "Entrepreneurship and startup showcase" },
        ],
        research_works: &[
            "Advanced AI and Machine Learning Research",
            "Medical Innovations and Drug Discovery",
            "Climate Change and Environmental Studies",
            "Quantum Computing and Physics Research",
        ],
        sports: &[
            SportsCategory { category: "Team Sports", sports: &["Basketball", "Football", "Soccer", "Hockey"] },
            SportsCategory { category: "Individual Sports", sports: &["Swimming", "Tennis", "Track & Field", "Golf"] },
            SportsCategory { category: "Water Sports", sports: &["Rowing", "Sailing", "Water Polo"] },
        ],
        facilities: &[
            "State-of-the-art laboratories",
            "World-class library system",
            "Modern dormitories",
            "Athletic facilities",
        ],
    },
    College {
        id: 2,
        name: "Stanford University",
        location: "Stanford, CA",
        kind: CollegeKind::Private,
        rating: 4.8,
        admission_date: "Jan 15, 2025",
        research_count: 980,
        students: "17,000+",
        description: "Stanford University is a private research university in Stanford, California, known for its academic strength and proximity to Silicon Valley.",
        admission_process: "Looks for intellectual vitality, leadership potential and personal context. Requires transcripts, standardized tests, essays and letters of recommendation.",
        programs: &["Computer Science", "Engineering", "Business", "Medicine", "Liberal Arts"],
        events: &[
            Event { name: "Tech Symposium", date: "February 28, 2025", description: "Latest innovations in technology and engineering" },
            Event { name: "Entrepreneurship Summit", date: "March 25, 2025", description: "Startup pitches and venture capital networking" },
            Event { name: "Art Exhibition", date: "April 15, 2025", description: "Student and faculty artistic works showcase" },
        ],
        research_works: &[
            "Computer Science and Artificial Intelligence",
            "Bioengineering and Medical Technology",
            "Sustainable Energy Solutions",
            "Human-Computer Interaction",
        ],
        sports: &[
            SportsCategory { category: "Team Sports", sports: &["Football", "Basketball", "Soccer", "Volleyball"] },
            SportsCategory { category: "Individual Sports", sports: &["Swimming", "Tennis", "Golf", "Track & Field"] },
            SportsCategory { category: "Olympic Sports", sports: &["Gymnastics", "Fencing", "Cycling"] },
        ],
        facilities: &[
            "Silicon Valley connections",
            "Innovation labs",
            "Research centers",
            "Athletic complexes",
        ],
    },
    College {
        id: 3,
        name: "MIT",
        location: "Cambridge, MA",
        kind: CollegeKind::Private,
        rating: 4.9,
        admission_date: "Jan 1, 2025",
        research_count: 1100,
        students: "11,000+",
        description: "The Massachusetts Institute of Technology is a private land-grant research university in Cambridge, Massachusetts, central to the development of modern technology and science.",
        admission_process: "Looks for students who can handle the rigor of MIT academics and will contribute to the community. Considers academic performance, standardized tests, essays and extracurricular activities.",
        programs: &["Engineering", "Computer Science", "Physics", "Mathematics", "Economics"],
        events: &[
            Event { name: "Innovation Challenge", date: "March 10, 2025", description: "Student-led innovation and problem-solving competition" },
            Event { name: "Robotics Competition", date: "April 5, 2025", description: "International robotics championship" },
            Event { name: "Hackathon", date: "May 1, 2025", description: "48-hour coding and development marathon" },
        ],
        research_works: &[
            "Robotics and Autonomous Systems",
            "Quantum Computing and Information",
            "Clean Energy and Sustainability",
            "Biotechnology and Life Sciences",
        ],
        sports: &[
            SportsCategory { category: "Water Sports", sports: &["Rowing", "Sailing", "Swimming"] },
            SportsCategory { category: "Team Sports", sports: &["Basketball", "Soccer", "Volleyball"] },
            SportsCategory { category: "Individual Sports", sports: &["Cross Country", "Track & Field", "Tennis"] },
        ],
        facilities: &[
            "Advanced research laboratories",
            "Maker spaces",
            "Innovation centers",
            "Athletic facilities",
        ],
    },
    College {
        id: 4,
        name: "Yale University",
        location: "New Haven, CT",
        kind: CollegeKind::Private,
        rating: 4.7,
        admission_date: "Jan 2, 2025",
        research_count: 850,
        students: "13,000+",
        description: "Historic Ivy League university with strong liberal arts and research programs.",
        admission_process: "",
        programs: &["Liberal Arts", "Law", "Medicine", "Drama", "Music"],
        events: &[],
        research_works: &[],
        sports: &[],
        facilities: &[],
    },
    College {
        id: 5,
        name: "Princeton University",
        location: "Princeton, NJ",
        kind: CollegeKind::Private,
        rating: 4.8,
        admission_date: "Jan 1, 2025",
        research_count: 720,
        students: "8,500+",
        description: "Prestigious university known for undergraduate education and research excellence.",
        admission_process: "",
        programs: &["Liberal Arts", "Engineering", "Public Policy", "Economics", "Physics"],
        events: &[],
        research_works: &[],
        sports: &[],
        facilities: &[],
    },
    College {
        id: 6,
        name: "University of California, Berkeley",
        location: "Berkeley, CA",
        kind: CollegeKind::Public,
        rating: 4.6,
        admission_date: "Nov 30, 2024",
        research_count: 1400,
        students: "45,000+",
        description: "Top public research university with diverse academic programs and innovation.",
        admission_process: "",
        programs: &[],
        events: &[],
        research_works: &[],
        sports: &[],
        facilities: &[],
    },
];

pub fn colleges() -> &'static [College] {
    COLLEGES
}

pub fn find(id: u32) -> Option<&'static College> {
    COLLEGES.iter().find(|c| c.id == id)
}

pub fn find_by_name(name: &str) -> Option<&'static College> {
    COLLEGES.iter().find(|c| same_name(c.name, name))
}

/// College names match when equal after trimming and lowercasing.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Case-insensitive substring match on name, location or type. A blank
/// query returns the whole catalog.
pub fn search(query: &str) -> Vec<&'static College> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return COLLEGES.iter().collect();
    }
    COLLEGES
        .iter()
        .filter(|c| {
            c.name.to_lowercase().contains(&query)
                || c.location.to_lowercase().contains(&query)
                || c.kind.as_str().to_lowercase().contains(&query)
        })
        .collect()
}

const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Closest catalog name to a free-text college name, if any is close enough.
pub fn suggest(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    COLLEGES
        .iter()
        .map(|c| (c.name, strsim::jaro_winkler(&name, &c.name.to_lowercase())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(college, _)| college)
}

/// Showcase reviews displayed alongside user-submitted ones on the front page.
pub fn featured_reviews() -> Vec<ReviewRecord> {
    let featured = [
        (1, "Alex Johnson", "Harvard University", 5, "The application process was seamless and the campus facilities exceeded my expectations. The research opportunities are incredible!", (2024, 1, 15, 10, 30)),
        (2, "Maria Garcia", "Stanford University", 5, "Amazing faculty and cutting-edge technology. The entrepreneurship program helped me launch my startup during my studies.", (2024, 1, 10, 14, 20)),
        (3, "David Chen", "MIT", 4, "Challenging academics but incredibly rewarding. The innovation culture here is unmatched. Highly recommend for STEM students.", (2024, 1, 5, 9, 15)),
        (4, "Sarah Williams", "Yale University", 5, "The liberal arts program is exceptional. Small class sizes and personalized attention from professors made all the difference.", (2024, 1, 1, 16, 45)),
    ];

    featured
        .into_iter()
        .filter_map(|(id, author, college, rating, comment, (y, mo, d, h, mi))| {
            let submitted_at = Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single()?;
            Some(ReviewRecord {
                id,
                author_name: author.to_string(),
                college_name: college.to_string(),
                rating,
                comment: comment.to_string(),
                submitted_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mit_offers_physics() {
        let mit = find(3).unwrap();
        assert_eq!(mit.name, "MIT");
        assert!(mit.offers("Physics"));
        assert!(!mit.offers("Drama"));
        assert!(!mit.offers("physics"));
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<u32> = colleges().iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), colleges().len());
    }

    #[test]
    fn names_fold_case_beyond_ascii() {
        assert!(same_name("  Université Laval", "UNIVERSITÉ LAVAL "));
        assert!(same_name("MIT", "mit"));
        assert!(!same_name("MIT", "MIT Sloan"));
    }

    #[test]
    fn finds_by_name_ignoring_case() {
        assert_eq!(find_by_name("mit").map(|c| c.id), Some(3));
        assert_eq!(find_by_name("  yale university ").map(|c| c.id), Some(4));
        assert!(find_by_name("Oxford").is_none());
    }

    #[test]
    fn search_matches_name_location_and_type() {
        let cambridge: Vec<u32> = search("cambridge").iter().map(|c| c.id).collect();
        assert_eq!(cambridge, vec![1, 3]);

        let public: Vec<u32> = search("PUBLIC").iter().map(|c| c.id).collect();
        assert_eq!(public, vec![6]);

        assert_eq!(search("stanford").len(), 1);
        assert_eq!(search("   ").len(), colleges().len());
        assert!(search("sorbonne").is_empty());
    }

    #[test]
    fn berkeley_is_not_open_for_applications() {
        assert!(!find(6).unwrap().accepts_applications());
        assert!(find(1).unwrap().accepts_applications());
    }

    #[test]
    fn suggests_close_names() {
        assert_eq!(suggest("Stanford Universty"), Some("Stanford University"));
        assert_eq!(suggest("Qwertyuiop"), None);
    }

    #[test]
    fn featured_reviews_are_valid() {
        let reviews = featured_reviews();
        assert_eq!(reviews.len(), 4);
        assert!(reviews.iter().all(|r| (1..=5).contains(&r.rating)));
        assert!(reviews.iter().all(|r| find_by_name(&r.college_name).is_some()));
    }
}
