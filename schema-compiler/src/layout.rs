// Struct field placement.
//
// Data offsets are expressed in units of the field's own size, as they
// appear in the compiled schema. Sizes are given as lg2 of the bit width
// (0 = Bool, 3 = 8-bit, 4 = 16-bit, 5 = 32-bit, 6 = 64-bit).
//
// Fields are placed in ordinal order. Each new field takes the smallest
// free hole that fits, otherwise a fresh data word. Members of the unnamed
// union overlap each other; the 16-bit discriminant is placed when the
// second union member is laid out.

const HOLE_SLOTS: u32 = 6;

/// Free space left behind by smaller allocations, at most one hole per
/// size. `0` means no hole of that size (offset 0 is always taken first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct HoleSet {
    holes: [u32; HOLE_SLOTS as usize],
}

impl HoleSet {
    fn try_allocate(&mut self, lg_size: u32) -> Option<u32> {
        if lg_size >= HOLE_SLOTS {
            return None;
        }
        let slot = lg_size as usize;
        if self.holes[slot] != 0 {
            let result = self.holes[slot];
            self.holes[slot] = 0;
            return Some(result);
        }
        let next = self.try_allocate(lg_size + 1)?;
        let result = next * 2;
        self.holes[slot] = result + 1;
        Some(result)
    }

    fn add_holes_at_end(&mut self, mut lg_size: u32, mut offset: u32, limit_lg_size: u32) {
        while lg_size < limit_lg_size {
            self.holes[lg_size as usize] = offset;
            lg_size += 1;
            offset = (offset + 1) / 2;
        }
    }

    /// Grow the allocation at `old_offset` by `expansion_factor` doublings,
    /// if the space right after it is free.
    fn try_expand(&mut self, old_lg_size: u32, old_offset: u32, expansion_factor: u32) -> bool {
        if expansion_factor == 0 {
            return true;
        }
        if old_lg_size == HOLE_SLOTS {
            return false;
        }
        if self.holes[old_lg_size as usize] != old_offset + 1 {
            return false;
        }
        if self.try_expand(old_lg_size + 1, old_offset >> 1, expansion_factor - 1) {
            self.holes[old_lg_size as usize] = 0;
            true
        } else {
            false
        }
    }

    fn smallest_at_least(&self, lg_size: u32) -> Option<u32> {
        (lg_size..HOLE_SLOTS).find(|&i| self.holes[i as usize] != 0)
    }
}

/// Layout of a whole struct: its data and pointer sections.
#[derive(Debug, Clone, Default)]
pub struct StructLayout {
    data_word_count: u32,
    pointer_count: u32,
    holes: HoleSet,
}

impl StructLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data(&mut self, lg_size: u32) -> u32 {
        if let Some(hole) = self.holes.try_allocate(lg_size) {
            return hole;
        }
        let offset = self.data_word_count << (6 - lg_size);
        self.data_word_count += 1;
        self.holes.add_holes_at_end(lg_size, offset + 1, HOLE_SLOTS);
        offset
    }

    pub fn add_pointer(&mut self) -> u32 {
        let offset = self.pointer_count;
        self.pointer_count += 1;
        offset
    }

    fn try_expand_data(&mut self, old_lg_size: u32, old_offset: u32, expansion_factor: u32) -> bool {
        self.holes.try_expand(old_lg_size, old_offset, expansion_factor)
    }

    pub fn data_word_count(&self) -> u16 {
        self.data_word_count as u16
    }

    pub fn pointer_count(&self) -> u16 {
        self.pointer_count as u16
    }
}

#[derive(Debug, Clone, Copy)]
struct DataLocation {
    lg_size: u32,
    offset: u32,
}

impl DataLocation {
    fn try_expand_to(&mut self, top: &mut StructLayout, new_lg_size: u32) -> bool {
        if new_lg_size <= self.lg_size {
            return true;
        }
        if top.try_expand_data(self.lg_size, self.offset, new_lg_size - self.lg_size) {
            self.offset >>= new_lg_size - self.lg_size;
            self.lg_size = new_lg_size;
            true
        } else {
            false
        }
    }
}

/// Space shared by the members of an unnamed union.
#[derive(Debug, Clone, Default)]
pub struct UnionLayout {
    group_count: u32,
    discriminant_offset: Option<u32>,
    data_locations: Vec<DataLocation>,
    pointer_locations: Vec<u32>,
}

impl UnionLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places the discriminant if it has not been placed yet and returns
    /// its offset, in 16-bit units.
    pub fn add_discriminant(&mut self, top: &mut StructLayout) -> u32 {
        match self.discriminant_offset {
            Some(offset) => offset,
            None => {
                let offset = top.add_data(4);
                self.discriminant_offset = Some(offset);
                offset
            }
        }
    }

    pub fn discriminant_offset(&self) -> Option<u32> {
        self.discriminant_offset
    }

    fn new_member_added(&mut self, top: &mut StructLayout) {
        self.group_count += 1;
        if self.group_count == 2 {
            self.add_discriminant(top);
        }
    }

    fn add_new_data_location(&mut self, top: &mut StructLayout, lg_size: u32) -> u32 {
        let offset = top.add_data(lg_size);
        self.data_locations.push(DataLocation { lg_size, offset });
        offset
    }

    fn add_new_pointer_location(&mut self, top: &mut StructLayout) -> u32 {
        let offset = top.add_pointer();
        self.pointer_locations.push(offset);
        offset
    }
}

/// How one union member uses one of the union's data locations.
#[derive(Debug, Clone, Default)]
struct DataLocationUsage {
    is_used: bool,
    lg_size_used: u32,
    holes: HoleSet,
}

impl DataLocationUsage {
    fn used(lg_size: u32) -> Self {
        Self {
            is_used: true,
            lg_size_used: lg_size,
            holes: HoleSet::default(),
        }
    }

    // Size of the smallest hole in this location that fits `lg_size`.
    fn smallest_hole_at_least(&self, location: &DataLocation, lg_size: u32) -> Option<u32> {
        if !self.is_used {
            (lg_size <= location.lg_size).then_some(location.lg_size)
        } else if lg_size >= self.lg_size_used {
            (lg_size < location.lg_size).then_some(lg_size)
        } else if let Some(hole) = self.holes.smallest_at_least(lg_size) {
            Some(hole)
        } else {
            (self.lg_size_used < location.lg_size).then_some(self.lg_size_used)
        }
    }

    fn allocate_from_hole(&mut self, location: &DataLocation, lg_size: u32) -> u32 {
        let result = if !self.is_used {
            self.is_used = true;
            self.lg_size_used = lg_size;
            0
        } else if lg_size >= self.lg_size_used {
            self.holes.add_holes_at_end(self.lg_size_used, 1, lg_size);
            self.lg_size_used = lg_size + 1;
            1
        } else if let Some(hole) = self.holes.try_allocate(lg_size) {
            hole
        } else {
            let result = 1 << (self.lg_size_used - lg_size);
            self.holes
                .add_holes_at_end(lg_size, result + 1, self.lg_size_used);
            self.lg_size_used += 1;
            result
        };
        (location.offset << (location.lg_size - lg_size)) + result
    }

    fn try_allocate_by_expanding(
        &mut self,
        location: &mut DataLocation,
        top: &mut StructLayout,
        lg_size: u32,
    ) -> Option<u32> {
        if !self.is_used {
            if !location.try_expand_to(top, lg_size) {
                return None;
            }
            self.is_used = true;
            self.lg_size_used = lg_size;
            return Some(location.offset << (location.lg_size - lg_size));
        }
        let new_size = self.lg_size_used.max(lg_size) + 1;
        if !self.try_expand_usage(location, top, new_size) {
            return None;
        }
        let result = self.holes.try_allocate(lg_size)?;
        Some((location.offset << (location.lg_size - lg_size)) + result)
    }

    fn try_expand_usage(
        &mut self,
        location: &mut DataLocation,
        top: &mut StructLayout,
        desired_usage: u32,
    ) -> bool {
        if desired_usage > location.lg_size && !location.try_expand_to(top, desired_usage) {
            return false;
        }
        self.holes
            .add_holes_at_end(self.lg_size_used, 1, desired_usage);
        self.lg_size_used = desired_usage;
        true
    }
}

/// Placement state for a single member of the unnamed union.
#[derive(Debug, Clone, Default)]
pub struct UnionMemberLayout {
    has_members: bool,
    data_usage: Vec<DataLocationUsage>,
    pointer_usage: usize,
}

impl UnionMemberLayout {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_member(&mut self, union: &mut UnionLayout, top: &mut StructLayout) {
        if !self.has_members {
            self.has_members = true;
            union.new_member_added(top);
        }
    }

    pub fn add_void(&mut self, union: &mut UnionLayout, top: &mut StructLayout) {
        self.add_member(union, top);
    }

    pub fn add_data(&mut self, union: &mut UnionLayout, top: &mut StructLayout, lg_size: u32) -> u32 {
        self.add_member(union, top);

        let mut best: Option<(u32, usize)> = None;
        for (i, location) in union.data_locations.iter().enumerate() {
            if i >= self.data_usage.len() {
                self.data_usage.push(DataLocationUsage::default());
            }
            if let Some(hole) = self.data_usage[i].smallest_hole_at_least(location, lg_size) {
                if best.map_or(true, |(size, _)| hole < size) {
                    best = Some((hole, i));
                }
            }
        }
        if let Some((_, i)) = best {
            return self.data_usage[i].allocate_from_hole(&union.data_locations[i], lg_size);
        }

        for i in 0..union.data_locations.len() {
            let location = &mut union.data_locations[i];
            if let Some(offset) = self.data_usage[i].try_allocate_by_expanding(location, top, lg_size) {
                return offset;
            }
        }

        let offset = union.add_new_data_location(top, lg_size);
        self.data_usage.push(DataLocationUsage::used(lg_size));
        offset
    }

    pub fn add_pointer(&mut self, union: &mut UnionLayout, top: &mut StructLayout) -> u32 {
        self.add_member(union, top);
        let index = self.pointer_usage;
        self.pointer_usage += 1;
        match union.pointer_locations.get(index) {
            Some(&offset) => offset,
            None => union.add_new_pointer_location(top),
        }
    }
}
