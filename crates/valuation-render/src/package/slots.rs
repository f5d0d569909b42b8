use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Image placeholders a client can fill from the rendered valuation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageSlot {
    CoverPage,
    InformationPage,
    PropertyPhotosCover,
    RecentSalesCover,
    RentComparablesCover,
    PricingCover,
    ClosingCover,
    PropertyInformationCover,
    PropertyPhoto1,
    PropertyPhoto2,
    PropertyPhoto3,
    PropertyPhoto4,
    TableOfContentsSide,
    PropertyInformationSide,
}

impl ImageSlot {
    pub const fn ordered() -> [Self; 14] {
        [
            Self::CoverPage,
            Self::InformationPage,
            Self::PropertyPhotosCover,
            Self::RecentSalesCover,
            Self::RentComparablesCover,
            Self::PricingCover,
            Self::ClosingCover,
            Self::PropertyInformationCover,
            Self::PropertyPhoto1,
            Self::PropertyPhoto2,
            Self::PropertyPhoto3,
            Self::PropertyPhoto4,
            Self::TableOfContentsSide,
            Self::PropertyInformationSide,
        ]
    }

    /// Token the browser-side editor uses for this placeholder.
    pub const fn id(self) -> &'static str {
        match self {
            Self::CoverPage => "page-1",
            Self::InformationPage => "page-2",
            Self::PropertyPhotosCover => "page-6",
            Self::RecentSalesCover => "page-8",
            Self::RentComparablesCover => "page-10",
            Self::PricingCover => "page-12",
            Self::ClosingCover => "page-14",
            Self::PropertyInformationCover => "page-17",
            Self::PropertyPhoto1 => "photo-1",
            Self::PropertyPhoto2 => "photo-2",
            Self::PropertyPhoto3 => "photo-3",
            Self::PropertyPhoto4 => "photo-4",
            Self::TableOfContentsSide => "side-img",
            Self::PropertyInformationSide => "side-img-2",
        }
    }

    /// Package column holding the image URL for this placeholder.
    pub const fn field(self) -> &'static str {
        match self {
            Self::CoverPage => "cover_image_url",
            Self::InformationPage => "information_image_url",
            Self::PropertyPhotosCover => "property_photos_cover_image_url",
            Self::RecentSalesCover => "recent_sales_cover_image_url",
            Self::RentComparablesCover => "rent_comparables_cover_image_url",
            Self::PricingCover => "pricing_cover_image_url",
            Self::ClosingCover => "closing_cover_image_url",
            Self::PropertyInformationCover => "property_information_cover_image_url",
            Self::PropertyPhoto1 => "property_image_1",
            Self::PropertyPhoto2 => "property_image_2",
            Self::PropertyPhoto3 => "property_image_3",
            Self::PropertyPhoto4 => "property_image_4",
            Self::TableOfContentsSide => "table_of_contents_image_url",
            Self::PropertyInformationSide => "property_information_image_url",
        }
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Serialize for ImageSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image slot '{0}'")]
pub struct UnknownSlot(pub String);

impl FromStr for ImageSlot {
    type Err = UnknownSlot;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ordered()
            .into_iter()
            .find(|slot| slot.id() == value)
            .ok_or_else(|| UnknownSlot(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_slot_round_trips_through_its_id() {
        for slot in ImageSlot::ordered() {
            assert_eq!(slot.id().parse::<ImageSlot>(), Ok(slot));
        }
    }

    #[test]
    fn ids_and_fields_are_unique() {
        let ids: HashSet<_> = ImageSlot::ordered().iter().map(|s| s.id()).collect();
        let fields: HashSet<_> = ImageSlot::ordered().iter().map(|s| s.field()).collect();
        assert_eq!(ids.len(), ImageSlot::ordered().len());
        assert_eq!(fields.len(), ImageSlot::ordered().len());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        assert_eq!(
            "photo-9".parse::<ImageSlot>(),
            Err(UnknownSlot("photo-9".to_string()))
        );
        assert!("PAGE-1".parse::<ImageSlot>().is_err());
        assert!("".parse::<ImageSlot>().is_err());
    }

    #[test]
    fn photo_slot_maps_to_numbered_column() {
        assert_eq!(ImageSlot::PropertyPhoto2.field(), "property_image_2");
        assert_eq!(ImageSlot::CoverPage.field(), "cover_image_url");
    }
}
