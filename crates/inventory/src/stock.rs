use serde::{Deserialize, Serialize};
use tracing::debug;

use stockroom_core::{
    Aggregate, DomainError, DomainResult, Entity, Location, ProductId, ensure_positive,
};

/// Stock of one product held at one location.
///
/// Quantities always satisfy `0 <= reserved <= on_hand <= max_capacity` and
/// `0 <= reorder_threshold <= max_capacity`. Every mutation is validated in
/// full before anything is written, so a rejected call leaves the record
/// untouched.
///
/// The record does no locking of its own. When shared between threads the
/// caller must serialise access, e.g. a single owning task or one lock per
/// record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StockSnapshot", into = "StockSnapshot")]
pub struct StockRecord {
    product_id: ProductId,
    location: Location,
    on_hand: i64,
    reserved: i64,
    reorder_threshold: i64,
    max_capacity: i64,
    version: u64,
}

impl StockRecord {
    /// Create a record with nothing reserved.
    ///
    /// Besides being non-negative, `reorder_threshold` must not exceed
    /// `max_capacity`: `new(.., 10, 60, 50)` is rejected with InvalidArgument
    /// rather than accepted with an unreachable threshold.
    pub fn new(
        product_id: impl Into<String>,
        location: impl Into<String>,
        initial_on_hand: i64,
        reorder_threshold: i64,
        max_capacity: i64,
    ) -> DomainResult<Self> {
        let product_id = ProductId::new(product_id)?;
        let location = Location::new(location)?;

        if initial_on_hand < 0 {
            return Err(DomainError::invalid_argument("initial on_hand must be >= 0"));
        }
        if reorder_threshold < 0 {
            return Err(DomainError::invalid_argument("reorder_threshold must be >= 0"));
        }
        if max_capacity <= 0 {
            return Err(DomainError::invalid_argument("max_capacity must be > 0"));
        }
        if initial_on_hand > max_capacity {
            return Err(DomainError::invalid_argument(
                "initial on_hand exceeds max_capacity",
            ));
        }
        if reorder_threshold > max_capacity {
            return Err(DomainError::invalid_argument(
                "reorder_threshold cannot exceed max_capacity",
            ));
        }

        Ok(Self {
            product_id,
            location,
            on_hand: initial_on_hand,
            reserved: 0,
            reorder_threshold,
            max_capacity,
            version: 0,
        })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// Units that can still be reserved: `on_hand - reserved`.
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }

    pub fn reorder_threshold(&self) -> i64 {
        self.reorder_threshold
    }

    pub fn max_capacity(&self) -> i64 {
        self.max_capacity
    }

    /// True when available stock has dropped below the reorder threshold.
    pub fn is_reorder_needed(&self) -> bool {
        self.available() < self.reorder_threshold
    }

    pub fn change_location(&mut self, new_location: impl Into<String>) -> DomainResult<()> {
        self.execute(&StockCommand::ChangeLocation {
            new_location: new_location.into(),
        })
        .map(drop)
    }

    pub fn add_stock(&mut self, quantity: i64) -> DomainResult<()> {
        self.execute(&StockCommand::AddStock { quantity }).map(drop)
    }

    /// Write off damaged units. Reservations that no longer fit in the
    /// remaining stock are truncated to `on_hand`.
    pub fn remove_damaged(&mut self, quantity: i64) -> DomainResult<()> {
        self.execute(&StockCommand::RemoveDamaged { quantity }).map(drop)
    }

    pub fn reserve(&mut self, quantity: i64) -> DomainResult<()> {
        self.execute(&StockCommand::Reserve { quantity }).map(drop)
    }

    pub fn release_reservation(&mut self, quantity: i64) -> DomainResult<()> {
        self.execute(&StockCommand::ReleaseReservation { quantity })
            .map(drop)
    }

    /// Ship reserved units: both `reserved` and `on_hand` drop by `quantity`.
    pub fn ship_reserved(&mut self, quantity: i64) -> DomainResult<()> {
        self.execute(&StockCommand::ShipReserved { quantity }).map(drop)
    }

    pub fn update_reorder_threshold(&mut self, threshold: i64) -> DomainResult<()> {
        self.execute(&StockCommand::UpdateReorderThreshold { threshold })
            .map(drop)
    }

    /// Change the capacity. A reorder threshold above the new capacity is
    /// lowered to it.
    pub fn update_max_capacity(&mut self, max_capacity: i64) -> DomainResult<()> {
        self.execute(&StockCommand::UpdateMaxCapacity { max_capacity })
            .map(drop)
    }

    fn decide(&self, command: &StockCommand) -> DomainResult<StockChange> {
        match command {
            StockCommand::ChangeLocation { new_location } => {
                let to = Location::new(new_location.as_str())?;
                Ok(StockChange::Relocated {
                    from: self.location.clone(),
                    to,
                })
            }
            StockCommand::AddStock { quantity } => {
                let quantity = *quantity;
                ensure_positive(quantity, "quantity to add")?;
                if quantity > self.max_capacity - self.on_hand {
                    return Err(DomainError::invalid_state(format!(
                        "cannot add {quantity} units: on_hand {} would exceed max_capacity {}",
                        self.on_hand, self.max_capacity
                    )));
                }
                Ok(StockChange::StockAdded { quantity })
            }
            StockCommand::RemoveDamaged { quantity } => {
                let quantity = *quantity;
                ensure_positive(quantity, "quantity to remove")?;
                if quantity > self.on_hand {
                    return Err(DomainError::invalid_state(format!(
                        "cannot remove {quantity} units: only {} on hand",
                        self.on_hand
                    )));
                }
                let remaining = self.on_hand - quantity;
                Ok(StockChange::DamagedRemoved {
                    quantity,
                    reservations_truncated: (self.reserved - remaining).max(0),
                })
            }
            StockCommand::Reserve { quantity } => {
                let quantity = *quantity;
                ensure_positive(quantity, "quantity to reserve")?;
                if quantity > self.available() {
                    return Err(DomainError::invalid_state(format!(
                        "cannot reserve {quantity} units: only {} available",
                        self.available()
                    )));
                }
                Ok(StockChange::Reserved { quantity })
            }
            StockCommand::ReleaseReservation { quantity } => {
                let quantity = *quantity;
                ensure_positive(quantity, "quantity to release")?;
                if quantity > self.reserved {
                    return Err(DomainError::invalid_state(format!(
                        "cannot release {quantity} units: only {} reserved",
                        self.reserved
                    )));
                }
                Ok(StockChange::ReservationReleased { quantity })
            }
            StockCommand::ShipReserved { quantity } => {
                let quantity = *quantity;
                ensure_positive(quantity, "quantity to ship")?;
                if quantity > self.reserved {
                    return Err(DomainError::invalid_state(format!(
                        "cannot ship {quantity} units: only {} reserved",
                        self.reserved
                    )));
                }
                if quantity > self.on_hand {
                    return Err(DomainError::invalid_state(format!(
                        "cannot ship {quantity} units: only {} on hand",
                        self.on_hand
                    )));
                }
                Ok(StockChange::Shipped { quantity })
            }
            StockCommand::UpdateReorderThreshold { threshold } => {
                let threshold = *threshold;
                if threshold < 0 {
                    return Err(DomainError::invalid_argument("reorder_threshold must be >= 0"));
                }
                if threshold > self.max_capacity {
                    return Err(DomainError::invalid_argument(format!(
                        "reorder_threshold {threshold} cannot exceed max_capacity {}",
                        self.max_capacity
                    )));
                }
                Ok(StockChange::ReorderThresholdUpdated { threshold })
            }
            StockCommand::UpdateMaxCapacity { max_capacity } => {
                let max_capacity = *max_capacity;
                if max_capacity <= 0 {
                    return Err(DomainError::invalid_argument("max_capacity must be > 0"));
                }
                if max_capacity < self.on_hand {
                    return Err(DomainError::invalid_state(format!(
                        "max_capacity {max_capacity} is below current on_hand {}",
                        self.on_hand
                    )));
                }
                Ok(StockChange::MaxCapacityUpdated {
                    max_capacity,
                    reorder_threshold_lowered_to: (self.reorder_threshold > max_capacity)
                        .then_some(max_capacity),
                })
            }
        }
    }
}

impl Entity for StockRecord {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}

impl Aggregate for StockRecord {
    type Command = StockCommand;
    type Change = StockChange;
    type Error = DomainError;

    fn version(&self) -> u64 {
        self.version
    }

    fn handle(&self, command: &Self::Command) -> Result<Self::Change, Self::Error> {
        self.decide(command).inspect_err(|err| {
            debug!(
                product_id = %self.product_id,
                command = command.kind(),
                error = %err,
                "stock command rejected"
            );
        })
    }

    fn execute(&mut self, command: &Self::Command) -> Result<Self::Change, Self::Error> {
        let change = self.handle(command)?;
        self.apply(&change);
        Ok(change)
    }
}

impl StockRecord {
    /// Commit a change produced by `decide` against the current state.
    fn apply(&mut self, change: &StockChange) {
        match change {
            StockChange::Relocated { to, .. } => {
                self.location = to.clone();
            }
            StockChange::StockAdded { quantity } => {
                self.on_hand += quantity;
            }
            StockChange::DamagedRemoved {
                quantity,
                reservations_truncated,
            } => {
                self.on_hand -= quantity;
                self.reserved -= reservations_truncated;
            }
            StockChange::Reserved { quantity } => {
                self.reserved += quantity;
            }
            StockChange::ReservationReleased { quantity } => {
                self.reserved -= quantity;
            }
            StockChange::Shipped { quantity } => {
                self.reserved -= quantity;
                self.on_hand -= quantity;
            }
            StockChange::ReorderThresholdUpdated { threshold } => {
                self.reorder_threshold = *threshold;
            }
            StockChange::MaxCapacityUpdated {
                max_capacity,
                reorder_threshold_lowered_to,
            } => {
                self.max_capacity = *max_capacity;
                if let Some(threshold) = reorder_threshold_lowered_to {
                    self.reorder_threshold = *threshold;
                }
            }
        }

        self.version += 1;

        debug!(
            product_id = %self.product_id,
            change = change.kind(),
            on_hand = self.on_hand,
            reserved = self.reserved,
            version = self.version,
            "stock change applied"
        );
    }
}

impl core::fmt::Debug for StockRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StockRecord")
            .field("product_id", &self.product_id.as_str())
            .field("location", &self.location.as_str())
            .field("on_hand", &self.on_hand)
            .field("reserved", &self.reserved)
            .field("available", &self.available())
            .field("reorder_threshold", &self.reorder_threshold)
            .field("max_capacity", &self.max_capacity)
            .finish()
    }
}

impl core::fmt::Display for StockRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} @ {}: on_hand={} reserved={} available={} reorder_threshold={} max_capacity={}",
            self.product_id,
            self.location,
            self.on_hand,
            self.reserved,
            self.available(),
            self.reorder_threshold,
            self.max_capacity
        )
    }
}

/// A request to change a [`StockRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockCommand {
    ChangeLocation { new_location: String },
    AddStock { quantity: i64 },
    RemoveDamaged { quantity: i64 },
    Reserve { quantity: i64 },
    ReleaseReservation { quantity: i64 },
    ShipReserved { quantity: i64 },
    UpdateReorderThreshold { threshold: i64 },
    UpdateMaxCapacity { max_capacity: i64 },
}

impl StockCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            StockCommand::ChangeLocation { .. } => "change_location",
            StockCommand::AddStock { .. } => "add_stock",
            StockCommand::RemoveDamaged { .. } => "remove_damaged",
            StockCommand::Reserve { .. } => "reserve",
            StockCommand::ReleaseReservation { .. } => "release_reservation",
            StockCommand::ShipReserved { .. } => "ship_reserved",
            StockCommand::UpdateReorderThreshold { .. } => "update_reorder_threshold",
            StockCommand::UpdateMaxCapacity { .. } => "update_max_capacity",
        }
    }
}

/// An accepted, fully resolved transition of a [`StockRecord`].
///
/// Returned to the caller of `execute`; nothing here is published anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockChange {
    Relocated {
        from: Location,
        to: Location,
    },
    StockAdded {
        quantity: i64,
    },
    DamagedRemoved {
        quantity: i64,
        /// Reserved units dropped because they exceeded the remaining stock.
        reservations_truncated: i64,
    },
    Reserved {
        quantity: i64,
    },
    ReservationReleased {
        quantity: i64,
    },
    Shipped {
        quantity: i64,
    },
    ReorderThresholdUpdated {
        threshold: i64,
    },
    MaxCapacityUpdated {
        max_capacity: i64,
        reorder_threshold_lowered_to: Option<i64>,
    },
}

impl StockChange {
    /// Stable name of the change (e.g. "stock.shipped").
    pub fn kind(&self) -> &'static str {
        match self {
            StockChange::Relocated { .. } => "stock.relocated",
            StockChange::StockAdded { .. } => "stock.added",
            StockChange::DamagedRemoved { .. } => "stock.damaged_removed",
            StockChange::Reserved { .. } => "stock.reserved",
            StockChange::ReservationReleased { .. } => "stock.reservation_released",
            StockChange::Shipped { .. } => "stock.shipped",
            StockChange::ReorderThresholdUpdated { .. } => "stock.reorder_threshold_updated",
            StockChange::MaxCapacityUpdated { .. } => "stock.max_capacity_updated",
        }
    }
}

/// Flat serialised form of a [`StockRecord`].
///
/// Converting back into a record re-checks every invariant; `available` is
/// derived and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub product_id: String,
    pub location: String,
    pub on_hand: i64,
    pub reserved: i64,
    pub reorder_threshold: i64,
    pub max_capacity: i64,
    #[serde(default)]
    pub version: u64,
}

impl From<StockRecord> for StockSnapshot {
    fn from(record: StockRecord) -> Self {
        Self {
            product_id: record.product_id.into(),
            location: record.location.into(),
            on_hand: record.on_hand,
            reserved: record.reserved,
            reorder_threshold: record.reorder_threshold,
            max_capacity: record.max_capacity,
            version: record.version,
        }
    }
}

impl TryFrom<StockSnapshot> for StockRecord {
    type Error = DomainError;

    fn try_from(snapshot: StockSnapshot) -> Result<Self, Self::Error> {
        let mut record = StockRecord::new(
            snapshot.product_id,
            snapshot.location,
            snapshot.on_hand,
            snapshot.reorder_threshold,
            snapshot.max_capacity,
        )?;

        if snapshot.reserved < 0 {
            return Err(DomainError::invalid_argument("reserved must be >= 0"));
        }
        if snapshot.reserved > record.on_hand {
            return Err(DomainError::invalid_state(format!(
                "reserved {} exceeds on_hand {}",
                snapshot.reserved, record.on_hand
            )));
        }

        record.reserved = snapshot.reserved;
        record.version = snapshot.version;
        Ok(record)
    }
}
