use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{NearbyPost, Post, PostWithOwner};

/// Listing kind. Serialized with the capitalized labels clients send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostType {
    Rent,
    Sale,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Rent => "Rent",
            PostType::Sale => "Sale",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Rent" => Some(PostType::Rent),
            "Sale" => Some(PostType::Sale),
            _ => None,
        }
    }
}

/// Fixed utility vocabulary; anything outside it is a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utility {
    Furnished,
    Unfurnished,
    ParkingAvailable,
    PetFriendly,
    WifiIncluded,
    HeatingIncluded,
    WaterIncluded,
}

impl Utility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Utility::Furnished => "Furnished",
            Utility::Unfurnished => "Unfurnished",
            Utility::ParkingAvailable => "Parking Available",
            Utility::PetFriendly => "Pet Friendly",
            Utility::WifiIncluded => "WiFi Included",
            Utility::HeatingIncluded => "Heating Included",
            Utility::WaterIncluded => "Water Included",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Furnished" => Some(Utility::Furnished),
            "Unfurnished" => Some(Utility::Unfurnished),
            "Parking Available" => Some(Utility::ParkingAvailable),
            "Pet Friendly" => Some(Utility::PetFriendly),
            "WiFi Included" => Some(Utility::WifiIncluded),
            "Heating Included" => Some(Utility::HeatingIncluded),
            "Water Included" => Some(Utility::WaterIncluded),
            _ => None,
        }
    }
}

/// GeoJSON-style point; coordinates are always [longitude, latitude].
#[derive(Debug, Serialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point",
            coordinates: [longitude, latitude],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OwnerProfile {
    pub name: String,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    #[serde(rename = "type")]
    pub post_type: String,
    pub description: Option<String>,
    pub contact: String,
    pub utilities: Vec<String>,
    pub location: GeoPoint,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<OwnerProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl From<Post> for PostResponse {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            price: p.price,
            post_type: p.post_type,
            description: p.description,
            contact: p.contact,
            utilities: p.utilities,
            location: GeoPoint::new(p.longitude, p.latitude),
            image: p.image,
            created_at: p.created_at,
            updated_at: p.updated_at,
            user: None,
            distance_km: None,
        }
    }
}

impl From<PostWithOwner> for PostResponse {
    fn from(r: PostWithOwner) -> Self {
        let mut resp: PostResponse = r.post.into();
        resp.user = Some(OwnerProfile {
            name: r.owner_name,
            profile_pic: r.owner_profile_pic,
        });
        resp
    }
}

impl From<NearbyPost> for PostResponse {
    fn from(r: NearbyPost) -> Self {
        let mut resp: PostResponse = r.post.into();
        resp.user = Some(OwnerProfile {
            name: r.owner_name,
            profile_pic: r.owner_profile_pic,
        });
        resp.distance_km = Some(r.distance_km);
        resp
    }
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<PostType>,
    #[serde(rename = "minPrice")]
    pub min_price: Option<f64>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_type_vocabulary() {
        assert_eq!(PostType::parse("Rent"), Some(PostType::Rent));
        assert_eq!(PostType::parse("Sale"), Some(PostType::Sale));
        assert_eq!(PostType::parse("rent"), None);
        assert_eq!(PostType::parse("Lease"), None);
    }

    #[test]
    fn utility_labels_roundtrip() {
        for label in [
            "Furnished",
            "Unfurnished",
            "Parking Available",
            "Pet Friendly",
            "WiFi Included",
            "Heating Included",
            "Water Included",
        ] {
            let u = Utility::parse(label).expect(label);
            assert_eq!(u.as_str(), label);
        }
        assert_eq!(Utility::parse("Pool"), None);
        assert_eq!(Utility::parse("wifi included"), None);
    }

    #[test]
    fn geo_point_is_longitude_latitude() {
        let p = GeoPoint::new(-75.6, 45.4);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"][0], -75.6);
        assert_eq!(json["coordinates"][1], 45.4);
    }

    #[test]
    fn distance_omitted_unless_set() {
        let post = Post {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            price: 1200.0,
            post_type: "Rent".into(),
            description: None,
            contact: String::new(),
            utilities: vec![],
            longitude: -75.0,
            latitude: 45.0,
            image: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_value(PostResponse::from(post)).unwrap();
        assert!(json.get("distance_km").is_none());
        assert!(json.get("user").is_none());
        assert_eq!(json["type"], "Rent");
    }
}
